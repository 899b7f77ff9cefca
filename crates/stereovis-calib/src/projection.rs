//! Projection matrix construction: `P = K [R | t]`.

use stereovis_core::linalg::{hconcat_rt, mat3_mat34, Mat3, Mat34, Vec3};
use stereovis_core::rotation::rodrigues;

use crate::calibrate::{CameraExtrinsics, CameraIntrinsics};

/// A 3x4 camera projection matrix.
///
/// Rank 3 whenever the rotation is valid and the intrinsic matrix is
/// non-singular; degenerate inputs are caught downstream by the rectifier.
pub type ProjectionMatrix = Mat34;

/// Build the projection matrix for one calibrated view.
///
/// The extrinsic rotation arrives as an axis-angle vector and is converted
/// through Rodrigues' formula.
pub fn build_projection(
    intrinsics: &CameraIntrinsics,
    extrinsics: &CameraExtrinsics,
) -> ProjectionMatrix {
    let r = rodrigues(&extrinsics.rvec);
    build_projection_kr(&intrinsics.matrix, &r, &extrinsics.tvec)
}

/// Build a projection matrix from an explicit camera matrix, rotation
/// matrix, and translation vector.
pub fn build_projection_kr(k: &Mat3, r: &Mat3, t: &Vec3) -> ProjectionMatrix {
    mat3_mat34(k, &hconcat_rt(r, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stereovis_core::linalg::{left_block, mat3_det, IDENTITY3};

    #[test]
    fn test_identity_pose_projection() {
        let intr = CameraIntrinsics::from_params(500.0, 510.0, 320.0, 240.0);
        let extr = CameraExtrinsics {
            rvec: [0.0, 0.0, 0.0],
            tvec: [0.0, 0.0, 0.0],
        };
        let p = build_projection(&intr, &extr);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(p[i][j], intr.matrix[i][j], epsilon = 1e-12);
            }
            assert_relative_eq!(p[i][3], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_projection_has_rank_three() {
        let intr = CameraIntrinsics::from_params(800.0, 820.0, 320.0, 240.0);
        let extr = CameraExtrinsics {
            rvec: [0.2, -0.1, 0.4],
            tvec: [0.5, -0.2, 2.0],
        };
        let p = build_projection(&intr, &extr);
        // det(K) * det(R) != 0 implies the left 3x3 block is invertible.
        assert!(mat3_det(&left_block(&p)).abs() > 1.0);
    }

    #[test]
    fn test_rotation_block_is_applied() {
        let r = rodrigues(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let p = build_projection_kr(&IDENTITY3, &r, &[1.0, 2.0, 3.0]);
        // With K = I the left block is the rotation itself.
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(p[i][j], r[i][j], epsilon = 1e-12);
            }
        }
        assert_eq!([p[0][3], p[1][3], p[2][3]], [1.0, 2.0, 3.0]);
    }
}
