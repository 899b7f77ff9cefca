#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera calibration from planar pattern observations.
pub mod calibrate;

/// Plane homography estimation (DLT).
pub mod homography;

/// Line-oriented persistence of calibration results.
pub mod io;

/// Calibration pattern geometry and corner observations.
pub mod pattern;

/// Projection matrix construction.
pub mod projection;

/// Sub-pixel corner refinement.
pub mod refine;

use thiserror::Error;

/// Errors produced by the calibration pipeline.
#[derive(Debug, Error)]
pub enum CalibError {
    /// Fewer valid pattern observations than the configured minimum.
    #[error("calibration requires at least {required} valid observations, got {actual}")]
    InsufficientObservations {
        /// Minimum number of observations required.
        required: usize,
        /// Number of observations provided.
        actual: usize,
    },

    /// A matrix inversion or decomposition hit a singular configuration.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// Underlying I/O failure while persisting or loading calibration data.
    #[error("calibration i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted calibration file did not match the expected layout.
    #[error("malformed calibration file: {0}")]
    Parse(String),
}

pub use calibrate::{calibrate, CalibrationOutcome, CameraExtrinsics, CameraIntrinsics};
pub use pattern::{detect_corners, CalibrationPattern, CornerObservation, PatternDetector};
pub use projection::{build_projection, build_projection_kr, ProjectionMatrix};
