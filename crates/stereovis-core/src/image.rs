use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by image construction and access.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The provided buffer length does not match the image dimensions.
    #[error("invalid image data length: expected {expected}, got {actual}")]
    InvalidDataLength {
        /// Expected buffer length (`width * height`).
        expected: usize,
        /// Actual buffer length provided.
        actual: usize,
    },
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

/// A single-channel 8-bit image stored row-major.
///
/// This is the only raster type the geometry pipeline needs; decoding and
/// encoding image files is delegated to external collaborators.
#[derive(Debug, Clone)]
pub struct GrayImage {
    size: ImageSize,
    data: Vec<u8>,
}

impl GrayImage {
    /// Create an image from a row-major pixel buffer.
    pub fn new(size: ImageSize, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = size.width * size.height;
        if data.len() != expected {
            return Err(ImageError::InvalidDataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Create an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F>(size: ImageSize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> u8,
    {
        let mut data = Vec::with_capacity(size.width * size.height);
        for y in 0..size.height {
            for x in 0..size.width {
                data.push(f(x, y));
            }
        }
        Self { size, data }
    }

    /// Image dimensions.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Row-major pixel buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pixel value at `(x, y)`. Panics if out of bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.size.width + x]
    }

    /// Pixel value at `(x, y)`, clamping coordinates to the image borders.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> u8 {
        let x = x.clamp(0, self.size.width as i64 - 1) as usize;
        let y = y.clamp(0, self.size.height as i64 - 1) as usize;
        self.pixel(x, y)
    }

    /// Bilinearly interpolated intensity at a sub-pixel location.
    ///
    /// Coordinates outside the image are clamped to the border.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.pixel_clamped(x0, y0) as f64;
        let p10 = self.pixel_clamped(x0 + 1, y0) as f64;
        let p01 = self.pixel_clamped(x0, y0 + 1) as f64;
        let p11 = self.pixel_clamped(x0 + 1, y0 + 1) as f64;

        p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy
    }
}
