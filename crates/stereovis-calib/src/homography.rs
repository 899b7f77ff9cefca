//! Plane-to-image homography estimation by the normalized DLT.

use stereovis_core::linalg::{mat3_inverse, mat3_mul, Mat3};
use stereovis_core::svd::{mat_from_rows, smallest_right_singular_vector};

use crate::CalibError;

/// Estimate the homography mapping planar points `src` (the board plane, in
/// its own x/y coordinates) onto image points `dst`.
///
/// Both point sets are normalized to zero mean and sqrt(2) average distance
/// before building the DLT system; the result is denormalized and scaled so
/// `h[2][2] = 1`. Needs at least 4 correspondences.
pub fn homography_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Mat3, CalibError> {
    if src.len() != dst.len() || src.len() < 4 {
        return Err(CalibError::NumericalInstability(format!(
            "homography needs >= 4 matched points, got {} and {}",
            src.len(),
            dst.len()
        )));
    }

    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let n = src_n.len();
    let mut rows = Vec::with_capacity(2 * n * 9);
    for i in 0..n {
        let (x, y) = (src_n[i][0], src_n[i][1]);
        let (u, v) = (dst_n[i][0], dst_n[i][1]);
        rows.extend_from_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        rows.extend_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
    }
    let a = mat_from_rows(2 * n, 9, &rows);
    let h = smallest_right_singular_vector(&a);

    let h_norm = [
        [h[0], h[1], h[2]],
        [h[3], h[4], h[5]],
        [h[6], h[7], h[8]],
    ];

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = mat3_inverse(&t_dst).ok_or_else(|| {
        CalibError::NumericalInstability("degenerate normalization transform".into())
    })?;
    let mut hm = mat3_mul(&t_dst_inv, &mat3_mul(&h_norm, &t_src));

    if hm[2][2].abs() < 1e-12 {
        return Err(CalibError::NumericalInstability(
            "homography scale vanished".into(),
        ));
    }
    let scale = 1.0 / hm[2][2];
    for row in hm.iter_mut() {
        for v in row.iter_mut() {
            *v *= scale;
        }
    }
    Ok(hm)
}

/// Apply a homography to a 2D point.
pub fn apply_homography(h: &Mat3, p: &[f64; 2]) -> [f64; 2] {
    let w = h[2][0] * p[0] + h[2][1] * p[1] + h[2][2];
    [
        (h[0][0] * p[0] + h[0][1] * p[1] + h[0][2]) / w,
        (h[1][0] * p[0] + h[1][1] * p[1] + h[1][2]) / w,
    ]
}

/// Similarity transform bringing points to zero mean and sqrt(2) average
/// distance from the origin.
fn normalize_points(points: &[[f64; 2]]) -> (Vec<[f64; 2]>, Mat3) {
    let n = points.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in points {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;

    let mut mean_dist = 0.0;
    for p in points {
        let dx = p[0] - mx;
        let dy = p[1] - my;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;
    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let normalized = points
        .iter()
        .map(|p| [(p[0] - mx) * scale, (p[1] - my) * scale])
        .collect();
    let t = [
        [scale, 0.0, -scale * mx],
        [0.0, scale, -scale * my],
        [0.0, 0.0, 1.0],
    ];
    (normalized, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_known_homography() {
        let h_true = [
            [1.2, 0.1, 5.0],
            [-0.05, 0.9, -3.0],
            [0.0004, -0.0002, 1.0],
        ];
        let src: Vec<[f64; 2]> = (0..5)
            .flat_map(|i| (0..4).map(move |j| [j as f64 * 10.0, i as f64 * 10.0]))
            .collect();
        let dst: Vec<[f64; 2]> = src.iter().map(|p| apply_homography(&h_true, p)).collect();

        let h = homography_dlt(&src, &dst).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(h[i][j], h_true[i][j], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_too_few_points() {
        let pts = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(matches!(
            homography_dlt(&pts, &pts),
            Err(CalibError::NumericalInstability(_))
        ));
    }
}
