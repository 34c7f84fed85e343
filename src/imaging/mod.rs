//! Image processing, in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | `infer::get` on the leading bytes |
//! | **Identify** | full decode via `image::load_from_memory_with_format` |
//! | **Crop → JPEG** | `crop_imm` + Lanczos3 + `JpegEncoder` |
//! | **Resize → JPEG** | Lanczos3 + `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry and dimension math (unit testable)
//! - **Media**: The accepted media types and magic-byte sniffing
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
pub mod media;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, EncodedImage, ImageBackend, ResizedImage};
pub use calculations::{AspectRatio, PixelRect, QualityThresholds, QualityTier, Rect};
pub use media::{MediaType, Sniffed};
pub use params::{CropParams, Quality, ResizeParams, SurfaceLimits};
pub use rust_backend::RustBackend;
