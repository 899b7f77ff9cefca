//! Thin faer wrappers for the decompositions the geometry pipeline needs:
//! null-space extraction for DLT-style homogeneous systems and a full 3x3
//! SVD used for rank reduction and rotation orthonormalization.

use crate::linalg::{mat3_transpose, mat3_vec3, Mat3};

/// Build a faer matrix from row-major data.
pub fn mat_from_rows(rows: usize, cols: usize, data: &[f64]) -> faer::Mat<f64> {
    debug_assert_eq!(data.len(), rows * cols);
    let mut m = faer::Mat::<f64>::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            m.write(i, j, data[i * cols + j]);
        }
    }
    m
}

/// Right singular vector associated with the smallest singular value of `a`.
///
/// This is the least-squares solution of the homogeneous system `A x = 0`
/// subject to `|x| = 1`, the workhorse of DLT estimation.
pub fn smallest_right_singular_vector(a: &faer::Mat<f64>) -> Vec<f64> {
    let svd = a.svd();
    let v = svd.v();
    let col = v.col(v.ncols() - 1);
    (0..v.nrows()).map(|i| col[i]).collect()
}

/// Full SVD of a 3x3 matrix: `m = U * diag(s) * V^T`.
///
/// Singular values are returned in descending order; `U` and `V` are
/// orthonormal. Recovered as `s_i = u_i^T * m * v_i` so only the faer
/// factor matrices are consumed.
pub fn svd3(m: &Mat3) -> (Mat3, [f64; 3], Mat3) {
    let a = mat_from_rows(3, 3, &[
        m[0][0], m[0][1], m[0][2], //
        m[1][0], m[1][1], m[1][2], //
        m[2][0], m[2][1], m[2][2],
    ]);
    let svd = a.svd();
    let uf = svd.u();
    let vf = svd.v();

    let mut u = [[0.0; 3]; 3];
    let mut v = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            u[i][j] = uf.read(i, j);
            v[i][j] = vf.read(i, j);
        }
    }

    let mut s = [0.0; 3];
    for k in 0..3 {
        let vk = [v[0][k], v[1][k], v[2][k]];
        let mv = mat3_vec3(m, &vk);
        s[k] = u[0][k] * mv[0] + u[1][k] * mv[1] + u[2][k] * mv[2];
    }
    (u, s, v)
}

/// Project a 3x3 matrix onto the nearest rank-2 matrix by zeroing its
/// smallest singular value.
pub fn enforce_rank2(m: &Mat3) -> Mat3 {
    let (u, s, v) = svd3(m);
    let vt = mat3_transpose(&v);
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = s[0] * u[i][0] * vt[0][j] + s[1] * u[i][1] * vt[1][j];
        }
    }
    out
}

/// Project a 3x3 matrix onto the nearest rotation matrix (`U * V^T` with a
/// determinant sign fix).
pub fn nearest_rotation(m: &Mat3) -> Mat3 {
    let (mut u, _, v) = svd3(m);
    let vt = mat3_transpose(&v);
    let mut r = crate::linalg::mat3_mul(&u, &vt);
    if crate::linalg::mat3_det(&r) < 0.0 {
        for row in u.iter_mut() {
            row[2] = -row[2];
        }
        r = crate::linalg::mat3_mul(&u, &vt);
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{mat3_det, mat3_mul, IDENTITY3};
    use crate::rotation::rodrigues;
    use approx::assert_relative_eq;

    #[test]
    fn test_smallest_singular_vector_solves_nullspace() {
        // Rows are orthogonal to [1, -2, 1].
        let a = mat_from_rows(2, 3, &[1.0, 1.0, 1.0, 3.0, 2.0, 1.0]);
        let x = smallest_right_singular_vector(&a);
        let r0 = x[0] + x[1] + x[2];
        let r1 = 3.0 * x[0] + 2.0 * x[1] + x[2];
        assert_relative_eq!(r0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(r1, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_svd3_reconstructs() {
        let m = [[3.0, 1.0, -2.0], [0.5, 2.0, 1.0], [-1.0, 0.0, 4.0]];
        let (u, s, v) = svd3(&m);
        let vt = mat3_transpose(&v);
        for i in 0..3 {
            for j in 0..3 {
                let mut acc = 0.0;
                for k in 0..3 {
                    acc += s[k] * u[i][k] * vt[k][j];
                }
                assert_relative_eq!(acc, m[i][j], epsilon = 1e-9);
            }
        }
        assert!(s[0] >= s[1] && s[1] >= s[2] && s[2] >= -1e-12);
    }

    #[test]
    fn test_enforce_rank2_drops_determinant() {
        let m = [[2.0, 0.1, 0.3], [0.2, 1.5, -0.4], [0.0, 0.7, 1.1]];
        let r2 = enforce_rank2(&m);
        assert_relative_eq!(mat3_det(&r2), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nearest_rotation_of_noisy_rotation() {
        let r_true = rodrigues(&[0.2, 0.4, -0.1]);
        let mut noisy = r_true;
        noisy[0][1] += 1e-3;
        noisy[2][0] -= 1e-3;
        let r = nearest_rotation(&noisy);
        let rt_r = mat3_mul(&crate::linalg::mat3_transpose(&r), &r);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rt_r[i][j], IDENTITY3[i][j], epsilon = 1e-12);
            }
        }
        assert_relative_eq!(mat3_det(&r), 1.0, epsilon = 1e-12);
    }
}
