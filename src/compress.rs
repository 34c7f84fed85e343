//! Compression stage: bounded-width JPEG re-encode.
//!
//! Images wider than `max_width` are scaled down to it with the height
//! following proportionally; narrower images keep their dimensions and are
//! only re-encoded. Output is always JPEG.

use crate::config::CompressionConfig;
use crate::imaging::{BackendError, ImageBackend, MediaType, Quality, ResizeParams};
use bytes::Bytes;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub max_width: u32,
    pub quality: Quality,
}

impl CompressOptions {
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            max_width: config.max_width,
            quality: Quality::from_fraction(config.quality),
        }
    }
}

impl Default for CompressOptions {
    /// 1200 px wide at 0.7.
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl CompressedImage {
    pub fn was_resized(&self) -> bool {
        (self.width, self.height) != (self.source_width, self.source_height)
    }
}

/// Decode, bound the width, and re-encode as JPEG. Blocking.
///
/// The source is decoded once; its size is reported by the backend.
pub fn compress_image(
    backend: &impl ImageBackend,
    bytes: Bytes,
    format: MediaType,
    options: &CompressOptions,
) -> Result<CompressedImage, BackendError> {
    let resized = backend.resize(&ResizeParams {
        source: bytes,
        format,
        max_width: options.max_width,
        quality: options.quality,
    })?;
    let (dims, encoded) = (resized.source, resized.encoded);

    info!(
        "Compressed {}x{} → {}x{} at quality {} ({} bytes)",
        dims.width,
        dims.height,
        encoded.width,
        encoded.height,
        options.quality.value(),
        encoded.bytes.len()
    );
    Ok(CompressedImage {
        bytes: encoded.bytes,
        width: encoded.width,
        height: encoded.height,
        source_width: dims.width,
        source_height: dims.height,
    })
}
