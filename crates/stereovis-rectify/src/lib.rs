#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Projection matrix factorization into intrinsics, rotation and center.
pub mod decompose;

/// Epipolar rectification of a calibrated stereo pair.
pub mod rectify;

use thiserror::Error;

/// Errors produced while rectifying a stereo pair.
#[derive(Debug, Error)]
pub enum RectifyError {
    /// The camera geometry does not admit a rectifying rotation.
    #[error("degenerate stereo geometry: {0}")]
    DegenerateGeometry(String),

    /// A 3x3 block turned out singular during factorization or transform
    /// construction.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

pub use decompose::decompose_projection;
pub use rectify::{rectify, transform_points, RectifyingTransform};
