use stereovis_core::image::GrayImage;

use crate::brief::BriefExtractor;
use crate::epipolar::{fundamental_ransac, RansacParams, MIN_CORRESPONDENCES};
use crate::fast::FastDetector;
use crate::matcher::match_descriptors;
use crate::{DescriptorExtractor, EpipolarError, FeatureDetector};

/// Which binary descriptor to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorKind {
    /// Plain BRIEF, fastest and fine for near-upright image pairs.
    #[default]
    Brief,
    /// BRIEF rotated by the patch's intensity-centroid orientation.
    OrientedBrief,
}

/// Configuration of the detect-describe-match-verify pipeline.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Corner detector settings.
    pub detector: FastDetector,
    /// Descriptor variant.
    pub descriptor: DescriptorKind,
    /// Neighbors per query, 1 or 2; with 2 the ratio test applies.
    pub knn: usize,
    /// Ratio-test cutoff, best over second-best distance.
    pub max_ratio: f64,
    /// Drop correspondences inconsistent with a RANSAC fundamental matrix.
    pub geometric_verification: bool,
    /// RANSAC settings for the verification step.
    pub ransac: RansacParams,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            detector: FastDetector::default(),
            descriptor: DescriptorKind::Brief,
            knn: 2,
            max_ratio: 0.7,
            geometric_verification: true,
            ransac: RansacParams::default(),
        }
    }
}

/// One verified match between the two images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureCorrespondence {
    /// Pixel location in the first image.
    pub point1: [f64; 2],
    /// Pixel location in the second image.
    pub point2: [f64; 2],
    /// Hamming distance between the matched descriptors.
    pub distance: u32,
}

/// Detect, describe, match and geometrically verify features across an
/// image pair.
///
/// An empty result is not an error: images without detectable texture
/// simply yield no correspondences, and the caller decides whether that is
/// fatal. Verification runs only when enough matches survive the ratio
/// test to fit a fundamental matrix.
pub fn match_images(
    img1: &GrayImage,
    img2: &GrayImage,
    config: &MatcherConfig,
) -> Result<Vec<FeatureCorrespondence>, EpipolarError> {
    let kp1 = config.detector.detect(img1);
    let kp2 = config.detector.detect(img2);
    log::debug!("detected {} / {} keypoints", kp1.len(), kp2.len());

    let extractor = match config.descriptor {
        DescriptorKind::Brief => BriefExtractor::plain(),
        DescriptorKind::OrientedBrief => BriefExtractor::oriented(),
    };
    let (kp1, d1) = extractor.compute(img1, &kp1);
    let (kp2, d2) = extractor.compute(img2, &kp2);

    let matches = match_descriptors(&d1, &d2, config.knn, config.max_ratio);
    log::debug!("{} candidate matches", matches.len());

    let correspondences: Vec<FeatureCorrespondence> = matches
        .into_iter()
        .map(|(i, j, distance)| FeatureCorrespondence {
            point1: [kp1[i].x, kp1[i].y],
            point2: [kp2[j].x, kp2[j].y],
            distance,
        })
        .collect();

    if !config.geometric_verification {
        return Ok(correspondences);
    }
    let verified = verify_correspondences(correspondences, &config.ransac)?;
    log::debug!("{} correspondences after geometric verification", verified.len());
    Ok(verified)
}

/// Keep only the candidates consistent with a RANSAC fundamental matrix.
///
/// With fewer candidates than a minimal epipolar sample the list is
/// returned unverified. When no model gathers a consensus the whole
/// candidate set is dropped: "nothing survived verification" is an empty
/// result, not an error.
pub fn verify_correspondences(
    correspondences: Vec<FeatureCorrespondence>,
    params: &RansacParams,
) -> Result<Vec<FeatureCorrespondence>, EpipolarError> {
    if correspondences.len() < MIN_CORRESPONDENCES {
        return Ok(correspondences);
    }

    let x1: Vec<[f64; 2]> = correspondences.iter().map(|c| c.point1).collect();
    let x2: Vec<[f64; 2]> = correspondences.iter().map(|c| c.point2).collect();
    let mask = match fundamental_ransac(&x1, &x2, params) {
        Ok((_, mask)) => mask,
        Err(EpipolarError::NumericalInstability(_)) => {
            log::debug!("no epipolar consensus among {} candidates", correspondences.len());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    Ok(correspondences
        .into_iter()
        .zip(mask)
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect())
}
