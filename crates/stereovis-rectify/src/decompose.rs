use stereovis_calib::ProjectionMatrix;
use stereovis_core::linalg::{fourth_column, left_block, mat3_inverse, mat3_vec3, Mat3, Vec3};
use stereovis_core::rotation::rq3;

use crate::RectifyError;

/// Factor a 3x4 projection matrix `P = A·[R | t]` into its intrinsic matrix
/// `A`, rotation `R` and optical center `c`.
///
/// `A` and `R` come from the RQ decomposition of the left 3x3 block; the
/// center solves `M·c = −p4` so that `t = −R·c`.
pub fn decompose_projection(p: &ProjectionMatrix) -> Result<(Mat3, Mat3, Vec3), RectifyError> {
    let m = left_block(p);
    let (a, r) = rq3(&m).ok_or_else(|| {
        RectifyError::NumericalInstability("projection matrix has a singular left block".into())
    })?;

    let m_inv = mat3_inverse(&m).ok_or_else(|| {
        RectifyError::NumericalInstability("projection matrix has a singular left block".into())
    })?;
    let p4 = fourth_column(p);
    let c = mat3_vec3(&m_inv, &[-p4[0], -p4[1], -p4[2]]);

    Ok((a, r, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stereovis_core::linalg::{hconcat_rt, mat3_mat34};
    use stereovis_core::rotation::rodrigues;

    #[test]
    fn test_recovers_intrinsics_rotation_center() {
        let a: Mat3 = [[760.0, 0.0, 310.0], [0.0, 772.0, 245.0], [0.0, 0.0, 1.0]];
        let r = rodrigues(&[0.05, -0.12, 0.03]);
        let c: Vec3 = [0.2, -0.1, 0.4];
        let t = mat3_vec3(&r, &[-c[0], -c[1], -c[2]]);
        let p = mat3_mat34(&a, &hconcat_rt(&r, &t));

        let (a2, r2, c2) = decompose_projection(&p).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a2[i][j], a[i][j], epsilon = 1e-9);
                assert_relative_eq!(r2[i][j], r[i][j], epsilon = 1e-9);
            }
            assert_relative_eq!(c2[i], c[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_singular_left_block_errors() {
        let p: ProjectionMatrix = [
            [1.0, 2.0, 3.0, 0.0],
            [2.0, 4.0, 6.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        assert!(matches!(
            decompose_projection(&p),
            Err(RectifyError::NumericalInstability(_))
        ));
    }
}
