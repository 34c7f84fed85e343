//! Raster compositor: turn a confirmed crop into a JPEG at natural
//! resolution.
//!
//! Planning is pure and separate from the pixel work, so the mapping can
//! be tested against a [`MockBackend`](crate::imaging::backend::tests::MockBackend)
//! without encoding anything.
//!
//! The source rectangle is `round(crop · scale)` per component, clamped
//! inside the natural image, and the output buffer has exactly that size:
//! a 1:1 copy of natural pixels.

use crate::acquire::RawImageSource;
use crate::config::CropConfig;
use crate::crop::{CompletedCrop, natural_region};
use crate::imaging::{BackendError, CropParams, ImageBackend, Quality};
use crate::preview::DisplayedImage;
use bytes::Bytes;
use log::info;

/// An encoded crop, ready for packaging.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedRaster {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// Work out what to cut and how to encode it. Pure.
pub fn plan_composite(
    source: &RawImageSource,
    displayed: &DisplayedImage,
    crop: &CompletedCrop,
    config: &CropConfig,
) -> CropParams {
    let region = natural_region(displayed, crop);
    CropParams {
        source: source.bytes.clone(),
        format: source.media_type,
        region,
        output_width: region.width,
        output_height: region.height,
        quality: config.jpeg_quality(),
    }
}

/// Run a planned composite on the backend. Blocking.
pub fn composite(
    backend: &impl ImageBackend,
    params: &CropParams,
) -> Result<CroppedRaster, BackendError> {
    let encoded = backend.crop(params)?;
    info!(
        "Composited {}x{} crop at {}+{} ({} bytes)",
        encoded.width,
        encoded.height,
        params.region.x,
        params.region.y,
        encoded.bytes.len()
    );
    Ok(CroppedRaster {
        bytes: encoded.bytes,
        width: encoded.width,
        height: encoded.height,
        quality: params.quality,
    })
}
