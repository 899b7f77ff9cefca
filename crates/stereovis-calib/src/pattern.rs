//! Calibration pattern geometry and per-image corner observations.

use serde::{Deserialize, Serialize};
use stereovis_core::image::GrayImage;

use crate::refine::{corner_subpix, RefineConfig};

/// Fixed geometry of a planar chessboard calibration target.
///
/// `rows` and `cols` count inner corners, not squares; `square_size` is the
/// physical side length of one square (any consistent unit, typically
/// meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPattern {
    /// Inner corner rows.
    pub rows: usize,
    /// Inner corner columns.
    pub cols: usize,
    /// Physical side length of one square.
    pub square_size: f64,
}

impl CalibrationPattern {
    /// Number of corners the full pattern exposes.
    pub fn point_count(&self) -> usize {
        self.rows * self.cols
    }

    /// The pattern's known 3D points on the z = 0 plane, row-major, matching
    /// the corner ordering a detector reports.
    pub fn object_points(&self) -> Vec<[f64; 3]> {
        let mut points = Vec::with_capacity(self.point_count());
        for row in 0..self.rows {
            for col in 0..self.cols {
                points.push([
                    col as f64 * self.square_size,
                    row as f64 * self.square_size,
                    0.0,
                ]);
            }
        }
        points
    }
}

/// Corner locations detected in one calibration image, positionally paired
/// with the pattern's object points.
#[derive(Debug, Clone)]
pub struct CornerObservation {
    /// Detected 2D pixel coordinates, pattern order.
    pub image_points: Vec<[f64; 2]>,
    /// Known planar 3D points (z = 0), same order.
    pub object_points: Vec<[f64; 3]>,
}

/// Oracle that locates the calibration pattern's corners in a raw image.
///
/// Pattern detection itself is an external collaborator; the calibrator only
/// consumes the ordered corner list it reports.
pub trait PatternDetector {
    /// Locate all pattern corners in `image`, in pattern order. Returns
    /// `None` when the full grid is not visible.
    fn find_corners(&self, image: &GrayImage, pattern: &CalibrationPattern)
        -> Option<Vec<[f64; 2]>>;
}

/// Detect and refine pattern corners in one calibration image.
///
/// Returns `None` when the detector cannot see the full pattern — a
/// non-fatal outcome; the image is simply skipped. Detected corners are
/// refined to sub-pixel accuracy before pairing with object points.
pub fn detect_corners(
    image: &GrayImage,
    pattern: &CalibrationPattern,
    detector: &dyn PatternDetector,
) -> Option<CornerObservation> {
    let corners = detector.find_corners(image, pattern)?;
    if corners.len() != pattern.point_count() {
        return None;
    }
    let refined = corner_subpix(image, &corners, &RefineConfig::default());
    Some(CornerObservation {
        image_points: refined,
        object_points: pattern.object_points(),
    })
}
