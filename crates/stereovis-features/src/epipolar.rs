use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use stereovis_core::linalg::{mat3_mul, mat3_transpose, Mat3};
use stereovis_core::svd::{enforce_rank2, mat_from_rows, smallest_right_singular_vector};

use crate::EpipolarError;

/// The 3x3 fundamental matrix of an image pair, `x2^T F x1 = 0`.
pub type FundamentalMatrix = Mat3;

/// Minimum correspondences for the 8-point algorithm.
pub const MIN_CORRESPONDENCES: usize = 8;

/// RANSAC configuration for [`fundamental_ransac`].
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    /// Inlier threshold on the Sampson distance, in pixels.
    pub threshold: f64,
    /// Target probability of sampling at least one all-inlier set.
    pub confidence: f64,
    /// Hard cap on the number of sampling rounds.
    pub max_iterations: usize,
    /// Seed for the sampling RNG.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            confidence: 0.99,
            max_iterations: 1000,
            seed: 79,
        }
    }
}

/// Estimate the fundamental matrix with the normalized 8-point algorithm.
///
/// Points are conditioned with Hartley normalization, the homogeneous
/// system is solved by SVD, the rank-2 constraint is enforced and the
/// result is de-normalized and scaled to unit Frobenius norm.
pub fn fundamental_8point(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
) -> Result<FundamentalMatrix, EpipolarError> {
    if x1.len() != x2.len() {
        return Err(EpipolarError::NumericalInstability(
            "correspondence lists have different lengths".into(),
        ));
    }
    if x1.len() < MIN_CORRESPONDENCES {
        return Err(EpipolarError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: x1.len(),
        });
    }

    let (x1n, t1) = normalize_points(x1);
    let (x2n, t2) = normalize_points(x2);

    // Design matrix for x2n^T * F * x1n = 0, one row per correspondence.
    let n = x1n.len();
    let mut rows = Vec::with_capacity(n * 9);
    for i in 0..n {
        let (x, y) = (x1n[i][0], x1n[i][1]);
        let (xp, yp) = (x2n[i][0], x2n[i][1]);
        rows.extend_from_slice(&[xp * x, xp * y, xp, yp * x, yp * y, yp, x, y, 1.0]);
    }
    let a = mat_from_rows(n, 9, &rows);
    let fvec = smallest_right_singular_vector(&a);

    let f = [
        [fvec[0], fvec[1], fvec[2]],
        [fvec[3], fvec[4], fvec[5]],
        [fvec[6], fvec[7], fvec[8]],
    ];
    let f = enforce_rank2(&f);

    // Denormalize: F = T2^T * F * T1, then fix the overall scale.
    let f = mat3_mul(&mat3_mul(&mat3_transpose(&t2), &f), &t1);
    let norm: f64 = f
        .iter()
        .flatten()
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt();
    if norm < 1e-12 {
        return Err(EpipolarError::NumericalInstability(
            "degenerate correspondence geometry".into(),
        ));
    }
    let mut out = f;
    for row in out.iter_mut() {
        for v in row.iter_mut() {
            *v /= norm;
        }
    }
    Ok(out)
}

/// Robust fundamental matrix estimation.
///
/// Repeatedly fits the 8-point model to random minimal samples, scores
/// support with the Sampson distance, and refits on the largest consensus
/// set. Returns the refit model and the per-correspondence inlier mask.
/// The iteration count adapts downward as better models are found.
pub fn fundamental_ransac(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    params: &RansacParams,
) -> Result<(FundamentalMatrix, Vec<bool>), EpipolarError> {
    if x1.len() != x2.len() {
        return Err(EpipolarError::NumericalInstability(
            "correspondence lists have different lengths".into(),
        ));
    }
    let n = x1.len();
    if n < MIN_CORRESPONDENCES {
        return Err(EpipolarError::InsufficientCorrespondences {
            required: MIN_CORRESPONDENCES,
            actual: n,
        });
    }
    if n == MIN_CORRESPONDENCES {
        let f = fundamental_8point(x1, x2)?;
        return Ok((f, vec![true; n]));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut indices: Vec<usize> = (0..n).collect();

    let mut best_mask = vec![false; n];
    let mut best_inliers = 0usize;
    let mut needed = params.max_iterations;

    let mut s1 = [[0.0; 2]; MIN_CORRESPONDENCES];
    let mut s2 = [[0.0; 2]; MIN_CORRESPONDENCES];

    let mut iter = 0;
    while iter < needed.min(params.max_iterations) {
        iter += 1;
        indices.shuffle(&mut rng);
        for (k, &idx) in indices[..MIN_CORRESPONDENCES].iter().enumerate() {
            s1[k] = x1[idx];
            s2[k] = x2[idx];
        }
        let f = match fundamental_8point(&s1, &s2) {
            Ok(f) => f,
            // Degenerate minimal sample, draw another.
            Err(_) => continue,
        };

        let mut mask = vec![false; n];
        let mut inliers = 0;
        for i in 0..n {
            if sampson_distance(&f, &x1[i], &x2[i]) < params.threshold {
                mask[i] = true;
                inliers += 1;
            }
        }

        if inliers > best_inliers {
            best_inliers = inliers;
            best_mask = mask;

            // Shrink the iteration budget from the observed inlier ratio.
            let w = inliers as f64 / n as f64;
            let p_outlier_free = w.powi(MIN_CORRESPONDENCES as i32);
            if p_outlier_free > 1.0 - 1e-12 {
                break;
            }
            let updated =
                ((1.0 - params.confidence).ln() / (1.0 - p_outlier_free).ln()).ceil();
            if updated.is_finite() && updated >= 0.0 {
                needed = (updated as usize).max(1);
            }
        }
    }

    if best_inliers < MIN_CORRESPONDENCES {
        return Err(EpipolarError::NumericalInstability(
            "no consensus set large enough to fit a model".into(),
        ));
    }

    log::debug!("ransac kept {best_inliers}/{n} correspondences after {iter} iterations");

    // Final fit on the full consensus set.
    let in1: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| x1[i]).collect();
    let in2: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| x2[i]).collect();
    let f = fundamental_8point(&in1, &in2)?;
    Ok((f, best_mask))
}

/// Epipolar lines in the second image for points in the first.
///
/// Each line `l = F * x1` is returned as `(a, b, c)` coefficients scaled so
/// `a^2 + b^2 = 1`, making `a*x + b*y + c` a signed pixel distance. Pass
/// `F^T` to map second-image points to first-image lines.
pub fn epipolar_lines(points: &[[f64; 2]], f: &FundamentalMatrix) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| {
            let l = [
                f[0][0] * p[0] + f[0][1] * p[1] + f[0][2],
                f[1][0] * p[0] + f[1][1] * p[1] + f[1][2],
                f[2][0] * p[0] + f[2][1] * p[1] + f[2][2],
            ];
            let s = (l[0] * l[0] + l[1] * l[1]).sqrt();
            if s > 0.0 {
                [l[0] / s, l[1] / s, l[2] / s]
            } else {
                l
            }
        })
        .collect()
}

/// First-order geometric error of a correspondence under `F`, in pixels.
pub fn sampson_distance(f: &FundamentalMatrix, x1: &[f64; 2], x2: &[f64; 2]) -> f64 {
    let fx1 = [
        f[0][0] * x1[0] + f[0][1] * x1[1] + f[0][2],
        f[1][0] * x1[0] + f[1][1] * x1[1] + f[1][2],
        f[2][0] * x1[0] + f[2][1] * x1[1] + f[2][2],
    ];
    let ftx2 = [
        f[0][0] * x2[0] + f[1][0] * x2[1] + f[2][0],
        f[0][1] * x2[0] + f[1][1] * x2[1] + f[2][1],
        f[0][2] * x2[0] + f[1][2] * x2[1] + f[2][2],
    ];
    let x2tfx1 = x2[0] * fx1[0] + x2[1] * fx1[1] + fx1[2];
    let denom = fx1[0] * fx1[0] + fx1[1] * fx1[1] + ftx2[0] * ftx2[0] + ftx2[1] * ftx2[1];
    if denom <= 0.0 {
        return f64::INFINITY;
    }
    (x2tfx1 * x2tfx1 / denom).sqrt()
}

fn normalize_points(x: &[[f64; 2]]) -> (Vec<[f64; 2]>, Mat3) {
    let n = x.len() as f64;
    let (mut mx, mut my) = (0.0, 0.0);
    for p in x {
        mx += p[0];
        my += p[1];
    }
    mx /= n;
    my /= n;

    let mut mean_dist = 0.0;
    for p in x {
        let (dx, dy) = (p[0] - mx, p[1] - my);
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;
    let scale = if mean_dist > 0.0 {
        2.0_f64.sqrt() / mean_dist
    } else {
        1.0
    };

    let normalized = x
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
    use stereovis_core::linalg::mat3_det;

    /// Two pinhole cameras looking at a non-coplanar cloud; returns the
    /// pixel correspondences.
    fn synthetic_pair() -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let k = [[700.0, 0.0, 320.0], [0.0, 700.0, 240.0], [0.0, 0.0, 1.0]];
        let points = [
            [0.0, 0.0, 4.0],
            [0.5, -0.2, 3.0],
            [-0.4, 0.3, 5.0],
            [0.2, 0.4, 3.5],
            [-0.3, -0.4, 4.5],
            [0.6, 0.1, 2.8],
            [-0.1, 0.5, 6.0],
            [0.3, -0.5, 3.2],
            [-0.6, 0.2, 4.8],
            [0.1, 0.25, 5.5],
            [0.45, 0.45, 2.5],
            [-0.2, -0.1, 3.8],
        ];
        let project = |p: &[f64; 3], tx: f64| {
            let (x, y, z) = (p[0] - tx, p[1], p[2]);
            [k[0][0] * x / z + k[0][2], k[1][1] * y / z + k[1][2]]
        };
        let x1 = points.iter().map(|p| project(p, 0.0)).collect();
        let x2 = points.iter().map(|p| project(p, 0.3)).collect();
        (x1, x2)
    }

    #[test]
    fn test_8point_satisfies_epipolar_constraint() {
        let (x1, x2) = synthetic_pair();
        let f = fundamental_8point(&x1, &x2).unwrap();
        assert_relative_eq!(mat3_det(&f), 0.0, epsilon = 1e-10);
        for i in 0..x1.len() {
            assert!(sampson_distance(&f, &x1[i], &x2[i]) < 1e-6);
        }
    }

    #[test]
    fn test_8point_needs_eight_points() {
        let (x1, x2) = synthetic_pair();
        let err = fundamental_8point(&x1[..5], &x2[..5]).unwrap_err();
        assert!(matches!(
            err,
            EpipolarError::InsufficientCorrespondences {
                required: 8,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_ransac_rejects_outliers() {
        let (mut x1, mut x2) = synthetic_pair();
        let n_good = x1.len();
        // Gross outliers that no epipolar model should absorb.
        x1.push([10.0, 400.0]);
        x2.push([600.0, 20.0]);
        x1.push([500.0, 60.0]);
        x2.push([40.0, 430.0]);

        let (f, mask) = fundamental_ransac(&x1, &x2, &RansacParams::default()).unwrap();
        assert!(mask[..n_good].iter().all(|&m| m));
        assert!(!mask[n_good]);
        assert!(!mask[n_good + 1]);
        for i in 0..n_good {
            assert!(sampson_distance(&f, &x1[i], &x2[i]) < 1e-6);
        }
    }

    #[test]
    fn test_epipolar_lines_pass_through_matches() {
        let (x1, x2) = synthetic_pair();
        let f = fundamental_8point(&x1, &x2).unwrap();
        let lines = epipolar_lines(&x1, &f);
        for (line, p2) in lines.iter().zip(x2.iter()) {
            assert_relative_eq!(line[0] * line[0] + line[1] * line[1], 1.0, epsilon = 1e-12);
            let dist = line[0] * p2[0] + line[1] * p2[1] + line[2];
            assert!(dist.abs() < 1e-6);
        }
    }
}
