//! Preview renderer: decode an accepted source, fit it into the viewport,
//! and seed the crop engine.

use crate::acquire::RawImageSource;
use crate::config::PipelineConfig;
use crate::imaging::calculations::{centered_aspect_region, fit_within, scale_factors};
use crate::imaging::{BackendError, ImageBackend, Rect};
use crate::naming;
use log::info;
use serde::Serialize;

/// Characters kept in a preview card's display name.
pub const DISPLAY_NAME_CHARS: usize = 30;

/// A decoded image as it sits on screen.
///
/// Scale factors are derived from the current display size on every read,
/// so a resize is reflected in all later coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayedImage {
    pub natural: (u32, u32),
    pub display: (f64, f64),
}

impl DisplayedImage {
    pub fn new(natural: (u32, u32), display: (f64, f64)) -> Self {
        Self { natural, display }
    }

    /// `(naturalW / displayW, naturalH / displayH)`.
    pub fn scale(&self) -> (f64, f64) {
        scale_factors(self.natural, self.display)
    }

    pub fn with_display(self, display: (f64, f64)) -> Self {
        Self { display, ..self }
    }
}

/// What a preview card shows about the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewSummary {
    pub display_name: String,
    pub formatted_size: String,
}

impl PreviewSummary {
    pub fn of(source: &RawImageSource) -> Self {
        Self {
            display_name: naming::display_name(&source.file_name, DISPLAY_NAME_CHARS),
            formatted_size: format_megabytes(source.byte_len),
        }
    }
}

/// Size in MiB with two decimals, e.g. `"2.35 MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub displayed: DisplayedImage,
    pub initial_region: Rect,
    pub summary: PreviewSummary,
}

/// Decode the source and lay it out for cropping.
///
/// This is a blocking call (full decode); async callers run it on a
/// blocking task.
pub fn render_preview(
    backend: &impl ImageBackend,
    source: &RawImageSource,
    config: &PipelineConfig,
) -> Result<Preview, BackendError> {
    let dims = backend.identify(&source.bytes, source.media_type)?;
    if dims.width == 0 || dims.height == 0 {
        return Err(BackendError::DecodeFailure(format!(
            "{} decoded to an empty image",
            source.file_name
        )));
    }

    let natural = dims.as_tuple();
    let display = fit_within(
        natural,
        (config.display.max_width, config.display.max_height),
    );
    let displayed = DisplayedImage::new(natural, display);
    let initial_region = initial_region(&displayed, config);

    info!(
        "Preview {}: {}x{} shown at {:.0}x{:.0}",
        source.file_name, natural.0, natural.1, display.0, display.1
    );
    Ok(Preview {
        displayed,
        initial_region,
        summary: PreviewSummary::of(source),
    })
}

/// Centered, aspect-locked, `initial_fill` of the largest fitting region.
pub fn initial_region(displayed: &DisplayedImage, config: &PipelineConfig) -> Rect {
    centered_aspect_region(
        displayed.display,
        config.crop.aspect().value(),
        config.crop.initial_fill,
    )
}
