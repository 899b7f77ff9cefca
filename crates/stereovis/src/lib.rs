#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use stereovis_core as core;

#[doc(inline)]
pub use stereovis_calib as calib;

#[doc(inline)]
pub use stereovis_rectify as rectify;

#[doc(inline)]
pub use stereovis_features as features;
