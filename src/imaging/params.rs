//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline stages (which decide what raster to
//! produce) and the [`backend`](super::backend) (which does the actual
//! pixel work). This separation allows swapping backends (e.g. for testing
//! with a mock) without changing stage logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Built from the `0.0–1.0`
//!   factor the pipeline is configured with.
//! - [`SurfaceLimits`]: Largest off-screen buffer a backend may allocate.
//! - [`CropParams`]: Source bytes, natural-pixel region, output size, quality.
//! - [`ResizeParams`]: Source bytes, width bound, quality.

use super::calculations::PixelRect;
use super::media::MediaType;
use bytes::Bytes;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Convert a `0.0–1.0` quality factor (`0.95` → 95).
    pub fn from_fraction(factor: f64) -> Self {
        Self::new((factor.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    /// High-fidelity crop output.
    fn default() -> Self {
        Self(95)
    }
}

/// Ceiling on off-screen buffer size.
///
/// Defaults match the largest canvas mainstream browsers allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_side: u32,
    pub max_pixels: u64,
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_side: 16_384,
            max_pixels: 16_384 * 16_384,
        }
    }
}

/// Parameters for cutting a region out of a source and encoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: Bytes,
    pub format: MediaType,
    /// Region in natural pixels.
    pub region: PixelRect,
    /// Output buffer size. Equal to the region size for a 1:1 copy.
    pub output_width: u32,
    pub output_height: u32,
    pub quality: Quality,
}

/// Parameters for a bounded-width re-encode. Sources wider than
/// `max_width` are scaled down to it, height following; narrower ones keep
/// their size.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: Bytes,
    pub format: MediaType,
    pub max_width: u32,
    pub quality: Quality,
}
