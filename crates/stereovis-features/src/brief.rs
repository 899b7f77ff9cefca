use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stereovis_core::image::GrayImage;

use crate::{DescriptorExtractor, Keypoint};

/// Number of bytes in a descriptor (256 intensity comparisons).
pub const DESCRIPTOR_LEN: usize = 32;

/// Half-width of the sampling patch around a keypoint.
const PATCH_RADIUS: i64 = 24;

/// Keypoints closer than this to the image border are dropped; covers the
/// worst-case rotated sample offset.
const BORDER: i64 = 35;

/// Fixed seed so two images are described with the same test pattern.
const PATTERN_SEED: u64 = 0x5365;

/// BRIEF descriptor extractor.
///
/// Each descriptor bit compares the smoothed intensity at two offsets drawn
/// once from a seeded uniform distribution over the patch. With `oriented`
/// set, the offsets are rotated by the patch's intensity-centroid angle
/// before sampling, which buys rotation invariance at some matching cost.
#[derive(Debug, Clone)]
pub struct BriefExtractor {
    pattern: Vec<([f64; 2], [f64; 2])>,
    oriented: bool,
}

impl BriefExtractor {
    /// Extractor with the fixed sampling pattern, no orientation
    /// compensation.
    pub fn plain() -> Self {
        Self::with_seed(PATTERN_SEED, false)
    }

    /// Extractor that rotates the sampling pattern by the intensity-centroid
    /// orientation of each patch.
    pub fn oriented() -> Self {
        Self::with_seed(PATTERN_SEED, true)
    }

    /// Extractor with an explicit pattern seed.
    pub fn with_seed(seed: u64, oriented: bool) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pattern = Vec::with_capacity(DESCRIPTOR_LEN * 8);
        for _ in 0..DESCRIPTOR_LEN * 8 {
            let range = -(PATCH_RADIUS as f64)..=(PATCH_RADIUS as f64);
            let p = [rng.random_range(range.clone()), rng.random_range(range.clone())];
            let q = [rng.random_range(range.clone()), rng.random_range(range)];
            pattern.push((p, q));
        }
        Self { pattern, oriented }
    }

    fn orientation(&self, image: &GrayImage, cx: i64, cy: i64) -> f64 {
        // Intensity centroid over the square patch.
        let mut m10 = 0.0;
        let mut m01 = 0.0;
        for dy in -PATCH_RADIUS..=PATCH_RADIUS {
            for dx in -PATCH_RADIUS..=PATCH_RADIUS {
                let v = image.pixel_clamped(cx + dx, cy + dy) as f64;
                m10 += dx as f64 * v;
                m01 += dy as f64 * v;
            }
        }
        m01.atan2(m10)
    }

    fn describe(&self, image: &GrayImage, kp: &Keypoint) -> [u8; DESCRIPTOR_LEN] {
        let (cx, cy) = (kp.x, kp.y);
        let (sin, cos) = if self.oriented {
            self.orientation(image, cx as i64, cy as i64).sin_cos()
        } else {
            (0.0, 1.0)
        };

        let mut desc = [0u8; DESCRIPTOR_LEN];
        for (bit, (p, q)) in self.pattern.iter().enumerate() {
            let sample = |o: &[f64; 2]| {
                let x = cx + cos * o[0] - sin * o[1];
                let y = cy + sin * o[0] + cos * o[1];
                image.sample_bilinear(x, y)
            };
            if sample(p) < sample(q) {
                desc[bit / 8] |= 1 << (bit % 8);
            }
        }
        desc
    }
}

impl DescriptorExtractor for BriefExtractor {
    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &[Keypoint],
    ) -> (Vec<Keypoint>, Vec<[u8; DESCRIPTOR_LEN]>) {
        let (w, h) = (image.width() as i64, image.height() as i64);
        let mut kept = Vec::new();
        let mut descriptors = Vec::new();
        for kp in keypoints {
            let (x, y) = (kp.x as i64, kp.y as i64);
            if x < BORDER || y < BORDER || x >= w - BORDER || y >= h - BORDER {
                continue;
            }
            kept.push(*kp);
            descriptors.push(self.describe(image, kp));
        }
        (kept, descriptors)
    }
}
