use std::cmp::Ordering;
use std::collections::BinaryHeap;

use stereovis_core::image::GrayImage;

use crate::{FeatureDetector, Keypoint};

/// Bresenham circle of radius 3 around the candidate pixel, clockwise from
/// twelve o'clock.
const CIRCLE: [(i64, i64); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// FAST segment-test corner detector.
///
/// A pixel is a corner when `arc_length` consecutive pixels on the radius-3
/// circle are all brighter than the center by more than `threshold`, or all
/// darker. Detected corners are ranked by a sum-of-absolute-differences
/// score and thinned with 3x3 non-maximum suppression.
#[derive(Debug, Clone, Copy)]
pub struct FastDetector {
    /// Minimum intensity difference to the center pixel.
    pub threshold: u8,
    /// Required number of consecutive circle pixels, 9 for FAST-9.
    pub arc_length: usize,
    /// Apply 3x3 non-maximum suppression on the detector score.
    pub nms: bool,
}

impl Default for FastDetector {
    fn default() -> Self {
        Self {
            threshold: 20,
            arc_length: 9,
            nms: true,
        }
    }
}

#[derive(Copy, Clone, PartialEq)]
struct ScoredPoint {
    score: i32,
    x: usize,
    y: usize,
}

impl Eq for ScoredPoint {}

impl Ord for ScoredPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.y.cmp(&other.y))
            .then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for ScoredPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FeatureDetector for FastDetector {
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let (w, h) = (image.width(), image.height());
        if w < 7 || h < 7 {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for y in 3..h - 3 {
            for x in 3..w - 3 {
                if let Some(score) = self.corner_score(image, x, y) {
                    candidates.push(ScoredPoint { score, x, y });
                }
            }
        }

        if !self.nms {
            return candidates
                .into_iter()
                .map(|p| Keypoint {
                    x: p.x as f64,
                    y: p.y as f64,
                    score: p.score as f64,
                })
                .collect();
        }

        // Strongest-first sweep: keep a point, suppress its 3x3 neighborhood.
        let mut heap: BinaryHeap<ScoredPoint> = candidates.into_iter().collect();
        let mut suppressed = vec![false; w * h];
        let mut keypoints = Vec::new();
        while let Some(p) = heap.pop() {
            if suppressed[p.y * w + p.x] {
                continue;
            }
            keypoints.push(Keypoint {
                x: p.x as f64,
                y: p.y as f64,
                score: p.score as f64,
            });
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = (p.x as i64 + dx) as usize;
                    let ny = (p.y as i64 + dy) as usize;
                    suppressed[ny * w + nx] = true;
                }
            }
        }
        keypoints
    }
}

impl FastDetector {
    /// Segment test at `(x, y)`; the score is the sum of absolute
    /// differences over the qualifying arc, minus the threshold per pixel.
    fn corner_score(&self, image: &GrayImage, x: usize, y: usize) -> Option<i32> {
        let center = image.pixel(x, y);
        let lo = center.saturating_sub(self.threshold);
        let hi = center.saturating_add(self.threshold);

        let ring: [u8; 16] = std::array::from_fn(|i| {
            let (dx, dy) = CIRCLE[i];
            image.pixel((x as i64 + dx) as usize, (y as i64 + dy) as usize)
        });

        // High-speed rejection on the four compass pixels. A qualifying arc
        // shorter than 12 can touch as few as two of them, so the 3-of-4
        // test only applies to FAST-12 and up.
        if self.arc_length >= 12 {
            let compass = [ring[0], ring[4], ring[8], ring[12]];
            let brighter = compass.iter().filter(|&&p| p > hi).count();
            let darker = compass.iter().filter(|&&p| p < lo).count();
            if brighter < 3 && darker < 3 {
                return None;
            }
        }

        let mut best: Option<i32> = None;
        for start in 0..16 {
            let all_brighter = (0..self.arc_length).all(|k| ring[(start + k) % 16] > hi);
            let all_darker = (0..self.arc_length).all(|k| ring[(start + k) % 16] < lo);
            if !all_brighter && !all_darker {
                continue;
            }
            let score: i32 = (0..self.arc_length)
                .map(|k| center.abs_diff(ring[(start + k) % 16]) as i32 - self.threshold as i32)
                .sum();
            best = Some(best.map_or(score, |b: i32| b.max(score)));
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stereovis_core::image::ImageSize;

    fn image_7x7(data: [u8; 49]) -> GrayImage {
        GrayImage::new(
            ImageSize {
                width: 7,
                height: 7,
            },
            data.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_detects_isolated_corner() {
        #[rustfmt::skip]
        let img = image_7x7([
            50,  50,  50,  50,  50,  50,  50,
            50,  50,  50,  50,  50,  50,  50,
            50,  50,  50, 200,  50,  50,  50,
            50,  50, 200, 200, 200,  50,  50,
            50,  50,  50, 200,  50,  50,  50,
            50,  50,  50,  50,  50,  50,  50,
            50,  50,  50,  50,  50,  50,  50,
        ]);
        let keypoints = FastDetector::default().detect(&img);
        assert_eq!(keypoints.len(), 1);
        assert_eq!((keypoints[0].x, keypoints[0].y), (3.0, 3.0));
        assert!(keypoints[0].score > 0.0);
    }

    #[test]
    fn test_dark_corner_on_bright_background() {
        #[rustfmt::skip]
        let img = image_7x7([
            200, 200, 200, 200, 200, 200, 200,
            200, 200, 200, 200, 200, 200, 200,
            200, 200, 200, 200, 200, 200, 200,
            200, 200, 200,  20, 200, 200, 200,
            200, 200, 200, 200, 200, 200, 200,
            200, 200, 200, 200, 200, 200, 200,
            200, 200, 200, 200, 200, 200, 200,
        ]);
        let keypoints = FastDetector::default().detect(&img);
        assert_eq!(keypoints.len(), 1);
        assert_eq!((keypoints[0].x, keypoints[0].y), (3.0, 3.0));
    }

    #[test]
    fn test_nine_arc_touching_two_compass_pixels() {
        // A bright run over ring positions 1..=9 contains only two of the
        // four compass pixels; the segment test alone must still fire.
        let mut data = [50u8; 49];
        for &(dx, dy) in &CIRCLE[1..=9] {
            data[(3 + dy) as usize * 7 + (3 + dx) as usize] = 200;
        }
        let img = image_7x7(data);
        let detector = FastDetector {
            threshold: 20,
            arc_length: 9,
            nms: false,
        };
        let keypoints = detector.detect(&img);
        assert_eq!(keypoints.len(), 1);
        assert_eq!((keypoints[0].x, keypoints[0].y), (3.0, 3.0));
    }

    #[test]
    fn test_flat_image_has_no_corners() {
        let img = image_7x7([128; 49]);
        assert!(FastDetector::default().detect(&img).is_empty());
    }

    #[test]
    fn test_tiny_image_is_empty() {
        let img = GrayImage::from_fn(
            ImageSize {
                width: 5,
                height: 5,
            },
            |_, _| 0,
        );
        assert!(FastDetector::default().detect(&img).is_empty());
    }
}
