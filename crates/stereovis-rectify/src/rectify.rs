use stereovis_calib::ProjectionMatrix;
use stereovis_core::linalg::{
    cross3, hconcat_rt, left_block, mat3_inverse, mat3_mat34, mat3_mul, mat3_vec3, norm3, sub3,
    Mat3,
};

use crate::decompose::decompose_projection;
use crate::RectifyError;

/// Below this norm a direction vector is treated as zero.
const EPS: f64 = 1e-9;

/// Output of [`rectify`]: per-camera pixel homographies and the rectified
/// projection matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifyingTransform {
    /// Homography mapping first-camera pixels to rectified pixels.
    pub t1: Mat3,
    /// Homography mapping second-camera pixels to rectified pixels.
    pub t2: Mat3,
    /// Rectified projection matrix of the first camera.
    pub pn1: ProjectionMatrix,
    /// Rectified projection matrix of the second camera.
    pub pn2: ProjectionMatrix,
}

/// Compute the rectifying transforms for a calibrated stereo pair.
///
/// Both cameras are rotated onto a shared frame whose x axis is the baseline,
/// so that after warping by `t1`/`t2` corresponding points share a row. The
/// construction follows Fusiello, Trucco and Verri, "A compact algorithm for
/// rectification of stereo pairs".
pub fn rectify(
    p1: &ProjectionMatrix,
    p2: &ProjectionMatrix,
) -> Result<RectifyingTransform, RectifyError> {
    let (a1, r1, c1) = decompose_projection(p1)?;
    let (a2, _r2, c2) = decompose_projection(p2)?;

    // New x axis: the baseline. New y axis: orthogonal to the baseline and
    // to the first camera's optical axis. New z axis: completes the frame.
    let v1 = sub3(&c1, &c2);
    let v2 = cross3(&r1[2], &v1);
    let v3 = cross3(&v1, &v2);

    let n1 = norm3(&v1);
    if n1 < EPS {
        return Err(RectifyError::DegenerateGeometry(
            "optical centers coincide".into(),
        ));
    }
    let n2 = norm3(&v2);
    if n2 < EPS {
        return Err(RectifyError::DegenerateGeometry(
            "baseline is parallel to the first camera's optical axis".into(),
        ));
    }
    let n3 = norm3(&v3);

    let r: Mat3 = [
        [v1[0] / n1, v1[1] / n1, v1[2] / n1],
        [v2[0] / n2, v2[1] / n2, v2[2] / n2],
        [v3[0] / n3, v3[1] / n3, v3[2] / n3],
    ];

    // Shared intrinsics: average of the two cameras, zero skew.
    let mut a = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            a[i][j] = 0.5 * (a1[i][j] + a2[i][j]);
        }
    }
    a[0][1] = 0.0;

    let pn1 = new_projection(&a, &r, &c1);
    let pn2 = new_projection(&a, &r, &c2);

    let t1 = pixel_homography(&pn1, p1)?;
    let t2 = pixel_homography(&pn2, p2)?;

    log::debug!("rectified stereo pair, baseline length {n1:.6}");

    Ok(RectifyingTransform { t1, t2, pn1, pn2 })
}

/// Apply a 3x3 homography to 2D points by homogeneous perspective division.
pub fn transform_points(points: &[[f64; 2]], t: &Mat3) -> Vec<[f64; 2]> {
    points
        .iter()
        .map(|p| {
            let q = mat3_vec3(t, &[p[0], p[1], 1.0]);
            [q[0] / q[2], q[1] / q[2]]
        })
        .collect()
}

fn new_projection(a: &Mat3, r: &Mat3, c: &[f64; 3]) -> ProjectionMatrix {
    let rc = mat3_vec3(r, c);
    mat3_mat34(a, &hconcat_rt(r, &[-rc[0], -rc[1], -rc[2]]))
}

fn pixel_homography(pn: &ProjectionMatrix, p: &ProjectionMatrix) -> Result<Mat3, RectifyError> {
    let m_inv = mat3_inverse(&left_block(p)).ok_or_else(|| {
        RectifyError::NumericalInstability("projection matrix has a singular left block".into())
    })?;
    Ok(mat3_mul(&left_block(pn), &m_inv))
}
