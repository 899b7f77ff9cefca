//! Fixed-size matrix algebra on plain `[[f64; N]; M]` arrays.
//!
//! Projection matrices and homographies are small enough that closed-form
//! expressions beat a general linear-algebra backend; faer is reserved for
//! the decompositions in [`crate::svd`].

/// A 3x3 matrix stored row-major.
pub type Mat3 = [[f64; 3]; 3];

/// A 3x4 matrix stored row-major.
pub type Mat34 = [[f64; 4]; 3];

/// A 3-vector.
pub type Vec3 = [f64; 3];

/// The 3x3 identity matrix.
pub const IDENTITY3: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Dot product of two 3-vectors.
#[inline]
pub fn dot3(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product `a x b`.
#[inline]
pub fn cross3(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean norm of a 3-vector.
#[inline]
pub fn norm3(v: &Vec3) -> f64 {
    dot3(v, v).sqrt()
}

/// Component-wise difference `a - b`.
#[inline]
pub fn sub3(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Scale a 3-vector.
#[inline]
pub fn scale3(v: &Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Matrix product of two 3x3 matrices.
pub fn mat3_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in a.iter().enumerate() {
        for j in 0..3 {
            out[i][j] = row[0] * b[0][j] + row[1] * b[1][j] + row[2] * b[2][j];
        }
    }
    out
}

/// Matrix-vector product `m * v`.
pub fn mat3_vec3(m: &Mat3, v: &Vec3) -> Vec3 {
    [
        dot3(&m[0], v),
        dot3(&m[1], v),
        dot3(&m[2], v),
    ]
}

/// Transpose of a 3x3 matrix.
pub fn mat3_transpose(m: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = *v;
        }
    }
    out
}

/// Determinant of a 3x3 matrix.
pub fn mat3_det(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Closed-form inverse of a 3x3 matrix.
///
/// Returns `None` when the matrix is singular relative to its own scale, so
/// callers can surface a typed numerical-instability error instead of
/// propagating NaNs.
pub fn mat3_inverse(m: &Mat3) -> Option<Mat3> {
    let det = mat3_det(m);
    let scale = m
        .iter()
        .flatten()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if det.abs() <= 1e-12 * scale.powi(3).max(1e-300) {
        return None;
    }
    let inv_det = 1.0 / det;
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
            let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
            // cofactor of (j, i) for the adjugate transpose
            out[i][j] = (m[j1][i1] * m[j2][i2] - m[j1][i2] * m[j2][i1]) * inv_det;
        }
    }
    Some(out)
}

/// Product of a 3x3 matrix and a 3x4 matrix.
pub fn mat3_mat34(a: &Mat3, b: &Mat34) -> Mat34 {
    let mut out = [[0.0; 4]; 3];
    for (i, row) in a.iter().enumerate() {
        for j in 0..4 {
            out[i][j] = row[0] * b[0][j] + row[1] * b[1][j] + row[2] * b[2][j];
        }
    }
    out
}

/// Concatenate a rotation block and a translation column into `[R | t]`.
pub fn hconcat_rt(r: &Mat3, t: &Vec3) -> Mat34 {
    let mut out = [[0.0; 4]; 3];
    for i in 0..3 {
        out[i][..3].copy_from_slice(&r[i]);
        out[i][3] = t[i];
    }
    out
}

/// Left 3x3 block of a 3x4 matrix.
pub fn left_block(p: &Mat34) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        out[i].copy_from_slice(&p[i][..3]);
    }
    out
}

/// Fourth column of a 3x4 matrix.
pub fn fourth_column(p: &Mat34) -> Vec3 {
    [p[0][3], p[1][3], p[2][3]]
}

/// Solve the dense system `A x = b` in place by Gaussian elimination with
/// partial pivoting.
///
/// `a` is `n * n` row-major and `b` has length `n`; both are clobbered.
/// Returns `None` when a pivot falls below the singularity threshold.
pub fn solve_dense(a: &mut [f64], b: &mut [f64], n: usize) -> Option<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    for i in 0..n {
        let mut piv = i;
        let mut max_val = a[i * n + i].abs();
        for r in (i + 1)..n {
            let v = a[r * n + i].abs();
            if v > max_val {
                max_val = v;
                piv = r;
            }
        }
        if max_val < 1e-12 {
            return None;
        }
        if piv != i {
            for c in i..n {
                a.swap(i * n + c, piv * n + c);
            }
            b.swap(i, piv);
        }
        let diag = a[i * n + i];
        for c in i..n {
            a[i * n + c] /= diag;
        }
        b[i] /= diag;
        for r in (i + 1)..n {
            let factor = a[r * n + i];
            if factor == 0.0 {
                continue;
            }
            for c in i..n {
                a[r * n + c] -= factor * a[i * n + c];
            }
            b[r] -= factor * b[i];
        }
    }

    for i in (0..n).rev() {
        for r in 0..i {
            let factor = a[r * n + i];
            if factor != 0.0 {
                a[r * n + i] = 0.0;
                b[r] -= factor * b[i];
            }
        }
    }
    Some(b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mat3_inverse_roundtrip() {
        let m = [[2.0, 0.0, 1.0], [0.0, 3.0, -1.0], [1.0, 1.0, 1.0]];
        let inv = mat3_inverse(&m).unwrap();
        let prod = mat3_mul(&m, &inv);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(prod[i][j], IDENTITY3[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_mat3_inverse_singular() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 0.0]];
        assert!(mat3_inverse(&m).is_none());
    }

    #[test]
    fn test_cross_orthogonal() {
        let a = [1.0, 2.0, 3.0];
        let b = [-2.0, 0.5, 4.0];
        let c = cross3(&a, &b);
        assert_relative_eq!(dot3(&a, &c), 0.0, epsilon = 1e-12);
        assert_relative_eq!(dot3(&b, &c), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_dense() {
        // x = [1, -2, 3]
        let mut a = vec![2.0, 1.0, -1.0, 1.0, 3.0, 2.0, -1.0, 0.5, 4.0];
        let x_true = [1.0, -2.0, 3.0];
        let mut b = vec![
            2.0 * 1.0 + 1.0 * -2.0 + -1.0 * 3.0,
            1.0 * 1.0 + 3.0 * -2.0 + 2.0 * 3.0,
            -1.0 * 1.0 + 0.5 * -2.0 + 4.0 * 3.0,
        ];
        let x = solve_dense(&mut a, &mut b, 3).unwrap();
        for i in 0..3 {
            assert_relative_eq!(x[i], x_true[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_solve_dense_singular() {
        let mut a = vec![1.0, 2.0, 2.0, 4.0];
        let mut b = vec![1.0, 2.0];
        assert!(solve_dense(&mut a, &mut b, 2).is_none());
    }

    #[test]
    fn test_hconcat_left_block() {
        let r = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let t = [10.0, 11.0, 12.0];
        let p = hconcat_rt(&r, &t);
        assert_eq!(left_block(&p), r);
        assert_eq!(fourth_column(&p), t);
    }
}
