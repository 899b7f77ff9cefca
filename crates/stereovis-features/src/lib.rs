#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// BRIEF binary descriptors, plain and orientation-compensated.
pub mod brief;

/// Fundamental matrix estimation and epipolar lines.
pub mod epipolar;

/// FAST corner detection with non-maximum suppression.
pub mod fast;

/// Brute-force Hamming descriptor matching.
pub mod matcher;

/// Detect-describe-match-verify pipeline over an image pair.
pub mod pipeline;

use stereovis_core::image::GrayImage;
use thiserror::Error;

/// Errors produced by fundamental matrix estimation.
#[derive(Debug, Error)]
pub enum EpipolarError {
    /// Fewer point correspondences than the 8-point algorithm needs.
    #[error("fundamental matrix estimation requires at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of correspondences required.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },

    /// The correspondence geometry is degenerate and no model fits.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

/// A detected corner with its detector response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// X coordinate in pixels.
    pub x: f64,
    /// Y coordinate in pixels.
    pub y: f64,
    /// Detector score, larger is stronger.
    pub score: f64,
}

/// Corner detection capability.
pub trait FeatureDetector {
    /// Detect keypoints in a grayscale image.
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint>;
}

/// Binary descriptor extraction capability.
pub trait DescriptorExtractor {
    /// Compute a 256-bit descriptor per keypoint.
    ///
    /// Keypoints too close to the border for the sampling pattern are
    /// dropped; the returned keypoint list mirrors the descriptor list.
    fn compute(&self, image: &GrayImage, keypoints: &[Keypoint]) -> (Vec<Keypoint>, Vec<[u8; 32]>);
}

pub use brief::BriefExtractor;
pub use epipolar::{
    epipolar_lines, fundamental_8point, fundamental_ransac, FundamentalMatrix, RansacParams,
};
pub use fast::FastDetector;
pub use matcher::match_descriptors;
pub use pipeline::{
    match_images, verify_correspondences, DescriptorKind, FeatureCorrespondence, MatcherConfig,
};
