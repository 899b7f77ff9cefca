//! Axis-angle rotation conversions and RQ decomposition of 3x3 matrices.

use crate::linalg::{dot3, norm3, scale3, Mat3, Vec3, IDENTITY3};

/// Convert an axis-angle rotation vector to a rotation matrix.
///
/// Rodrigues' formula: `R = I + sin(t) * K + (1 - cos(t)) * K^2` where `K` is
/// the skew-symmetric cross-product matrix of the unit axis and `t` the
/// rotation angle (the norm of `rvec`).
pub fn rodrigues(rvec: &Vec3) -> Mat3 {
    let theta = norm3(rvec);
    if theta < 1e-12 {
        return IDENTITY3;
    }
    let axis = scale3(rvec, 1.0 / theta);
    let (sin_t, cos_t) = theta.sin_cos();
    let k = skew_symmetric(&axis);
    let k2 = crate::linalg::mat3_mul(&k, &k);

    let mut r = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            r[i][j] = IDENTITY3[i][j] + sin_t * k[i][j] + (1.0 - cos_t) * k2[i][j];
        }
    }
    r
}

/// Convert a rotation matrix back to an axis-angle vector.
pub fn rotation_to_axis_angle(r: &Mat3) -> Vec3 {
    let trace = r[0][0] + r[1][1] + r[2][2];
    let cos_t = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0);
    let theta = cos_t.acos();

    if theta < 1e-12 {
        return [0.0, 0.0, 0.0];
    }

    if std::f64::consts::PI - theta < 1e-6 {
        // Near pi the off-diagonal difference vanishes; recover the axis from
        // the dominant diagonal entry instead.
        let mut i = 0;
        for k in 1..3 {
            if r[k][k] > r[i][i] {
                i = k;
            }
        }
        let mut axis = [0.0; 3];
        axis[i] = ((r[i][i] + 1.0) / 2.0).max(0.0).sqrt();
        for j in 0..3 {
            if j != i {
                axis[j] = r[i][j] / (2.0 * axis[i]);
            }
        }
        let n = norm3(&axis);
        return scale3(&axis, theta / n);
    }

    let axis = [
        r[2][1] - r[1][2],
        r[0][2] - r[2][0],
        r[1][0] - r[0][1],
    ];
    scale3(&axis, theta / (2.0 * theta.sin()))
}

/// Skew-symmetric cross-product matrix of a 3-vector.
pub fn skew_symmetric(v: &Vec3) -> Mat3 {
    [
        [0.0, -v[2], v[1]],
        [v[2], 0.0, -v[0]],
        [-v[1], v[0], 0.0],
    ]
}

/// QR decomposition of a 3x3 matrix by modified Gram-Schmidt.
///
/// Returns `(Q, R)` with `Q` orthonormal and `R` upper-triangular, or `None`
/// when the columns are linearly dependent.
pub fn qr3(m: &Mat3) -> Option<(Mat3, Mat3)> {
    let cols: [Vec3; 3] = [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ];

    let mut q_cols = [[0.0f64; 3]; 3];
    let mut r = [[0.0f64; 3]; 3];
    for j in 0..3 {
        let mut v = cols[j];
        for i in 0..j {
            r[i][j] = dot3(&q_cols[i], &v);
            for k in 0..3 {
                v[k] -= r[i][j] * q_cols[i][k];
            }
        }
        r[j][j] = norm3(&v);
        if r[j][j] < 1e-12 {
            return None;
        }
        q_cols[j] = scale3(&v, 1.0 / r[j][j]);
    }

    let mut q = [[0.0; 3]; 3];
    for (j, col) in q_cols.iter().enumerate() {
        for i in 0..3 {
            q[i][j] = col[i];
        }
    }
    Some((q, r))
}

/// RQ decomposition of a 3x3 matrix.
///
/// Returns `(K, Q)` with `K` upper-triangular (positive diagonal) and `Q`
/// orthonormal such that `K * Q = m`, or `None` when `m` is singular.
/// Implemented by QR of the row/column reversed transpose.
pub fn rq3(m: &Mat3) -> Option<(Mat3, Mat3)> {
    // m1 = J * m^T * J with J the row-reversal permutation
    let mut m1 = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            m1[i][j] = m[2 - j][2 - i];
        }
    }
    let (qt, rt) = qr3(&m1)?;

    let mut k = [[0.0; 3]; 3];
    let mut q = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            k[i][j] = rt[2 - j][2 - i];
            q[i][j] = qt[2 - j][2 - i];
        }
    }

    // Force a positive diagonal on K, compensating in Q.
    for i in 0..3 {
        if k[i][i] < 0.0 {
            for r in 0..3 {
                k[r][i] = -k[r][i];
            }
            for c in 0..3 {
                q[i][c] = -q[i][c];
            }
        }
    }
    Some((k, q))
}
