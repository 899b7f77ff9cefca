//! Iterative sub-pixel corner refinement.
//!
//! Each corner is re-estimated as the point `q` minimizing
//! `sum_w (grad I(p) . (p - q))^2` over a fixed window — the gradient at any
//! window pixel is orthogonal to the vector joining it to a true corner.

use serde::{Deserialize, Serialize};
use stereovis_core::image::GrayImage;

/// Termination and window configuration for [`corner_subpix`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Half side of the search window; the full window is
    /// `(2 * half_window + 1)` pixels square.
    pub half_window: usize,
    /// Maximum refinement iterations per corner.
    pub max_iters: usize,
    /// Stop once the corner moves less than this (pixels) in one iteration.
    pub eps: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        // 11x11 window, 30 iterations, 0.1 px — the classic chessboard
        // refinement parameters.
        Self {
            half_window: 5,
            max_iters: 30,
            eps: 0.1,
        }
    }
}

/// Refine corner locations to sub-pixel accuracy.
///
/// Runs the iterative local search independently for every input corner;
/// each iteration re-centers the window on the current estimate and stops on
/// whichever of the two termination conditions (`eps`, `max_iters`) triggers
/// first. Corners whose local gradient structure is degenerate (flat or
/// single-edge windows) are returned unchanged.
pub fn corner_subpix(
    image: &GrayImage,
    corners: &[[f64; 2]],
    config: &RefineConfig,
) -> Vec<[f64; 2]> {
    corners
        .iter()
        .map(|c| refine_one(image, *c, config))
        .collect()
}

fn refine_one(image: &GrayImage, start: [f64; 2], config: &RefineConfig) -> [f64; 2] {
    let w = config.half_window as i64;
    let sigma = (config.half_window as f64) / 2.0;
    let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);

    let mut c = start;
    for _ in 0..config.max_iters {
        let mut a00 = 0.0;
        let mut a01 = 0.0;
        let mut a11 = 0.0;
        let mut b0 = 0.0;
        let mut b1 = 0.0;

        for dy in -w..=w {
            for dx in -w..=w {
                let px = c[0] + dx as f64;
                let py = c[1] + dy as f64;
                let gx =
                    (image.sample_bilinear(px + 1.0, py) - image.sample_bilinear(px - 1.0, py))
                        / 2.0;
                let gy =
                    (image.sample_bilinear(px, py + 1.0) - image.sample_bilinear(px, py - 1.0))
                        / 2.0;
                let weight = (-((dx * dx + dy * dy) as f64) * inv_two_sigma2).exp();

                let gxx = weight * gx * gx;
                let gxy = weight * gx * gy;
                let gyy = weight * gy * gy;
                a00 += gxx;
                a01 += gxy;
                a11 += gyy;
                b0 += gxx * px + gxy * py;
                b1 += gxy * px + gyy * py;
            }
        }

        let det = a00 * a11 - a01 * a01;
        let scale = a00.abs().max(a11.abs());
        if det.abs() <= 1e-12 * scale * scale {
            // Flat or single-edge window, nothing to refine against.
            break;
        }
        let qx = (a11 * b0 - a01 * b1) / det;
        let qy = (a00 * b1 - a01 * b0) / det;

        let dx = qx - c[0];
        let dy = qy - c[1];
        let step = (dx * dx + dy * dy).sqrt();
        if step > config.half_window as f64 {
            // Diverging outside the window; keep the last stable estimate.
            break;
        }
        c = [qx, qy];
        if step < config.eps {
            break;
        }
    }
    c
}
