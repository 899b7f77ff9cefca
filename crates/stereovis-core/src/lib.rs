#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Grayscale image container and sampling.
pub mod image;

/// Fixed-size matrix algebra on plain arrays and a dense linear solver.
pub mod linalg;

/// Axis-angle rotations and RQ decomposition.
pub mod rotation;

/// faer-backed singular value decomposition helpers.
pub mod svd;
