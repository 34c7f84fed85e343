//! CLI output formatting for every command.
//!
//! Output leads with the file a result is about, followed by indented
//! context lines. Rejections lead with the advisory message a person would
//! see, with the technical detail underneath.
//!
//! # Output Format
//!
//! ## Inspect
//!
//! ```text
//! dress.jpg (2.35 MB, image/jpeg)
//!     Natural: 3000x4500
//!     Display: 480x720 (scale 6.25)
//!     Initial crop: 384x576 at 48,72
//!     Crop output: 2400x3600 (acceptable)
//! ```
//!
//! ## Crop
//!
//! ```text
//! dress_cropped.jpg (0.52 MB, image/jpeg)
//!     Output: 2400x3600
//!     Written: out/dress_cropped.jpg
//!     Stored: file:///srv/bucket/1718000000123-dress_cropped.jpg
//!     SHA-256: 9f86d08...
//! ```
//!
//! ## Compress
//!
//! ```text
//! Compressing 3 files
//! 001 coat.jpg
//!     Source: photos/coat.png
//!     2400x1600 → 1200x800 (3.10 MB → 0.21 MB)
//! 002 (clip.gif)
//!     Please choose a JPEG, PNG or WEBP image
//!     Detail: clip.gif: unsupported media type image/gif
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout or stderr.
//! Format functions are pure.

use crate::batch::CompressEvent;
use crate::crop::QualityFeedback;
use crate::imaging::{MediaType, Rect};
use crate::package::OutputFile;
use crate::pipeline::PipelineError;
use crate::preview::{Preview, format_megabytes};
use crate::store::StoredObject;
use serde::Serialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_dimensions((width, height): (u32, u32)) -> String {
    format!("{width}x{height}")
}

/// Display-space rectangle, rounded to whole pixels.
fn format_rect(rect: &Rect) -> String {
    format!(
        "{:.0}x{:.0} at {:.0},{:.0}",
        rect.width, rect.height, rect.x, rect.y
    )
}

/// File header: name, size and media type.
fn file_header(name: &str, bytes: u64, media_type: MediaType) -> String {
    format!("{} ({}, {})", name, format_megabytes(bytes), media_type)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Inspect
// ============================================================================

/// What `inspect` reports about one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub file_name: String,
    pub media_type: MediaType,
    pub byte_len: u64,
    pub preview: Preview,
    pub quality: QualityFeedback,
}

pub fn format_inspect(report: &InspectReport) -> Vec<String> {
    let displayed = &report.preview.displayed;
    let (scale_x, scale_y) = displayed.scale();
    let scale = if (scale_x - scale_y).abs() < 1e-3 {
        format!("{scale_x:.2}")
    } else {
        format!("{scale_x:.2}/{scale_y:.2}")
    };

    let mut lines = vec![file_header(
        &report.file_name,
        report.byte_len,
        report.media_type,
    )];
    lines.push(format!(
        "{}Natural: {}",
        indent(1),
        format_dimensions(displayed.natural)
    ));
    lines.push(format!(
        "{}Display: {:.0}x{:.0} (scale {})",
        indent(1),
        displayed.display.0,
        displayed.display.1,
        scale
    ));
    lines.push(format!(
        "{}Initial crop: {}",
        indent(1),
        format_rect(&report.preview.initial_region)
    ));
    lines.extend(format_quality(&report.quality, 1));
    lines
}

pub fn print_inspect(report: &InspectReport) {
    for line in format_inspect(report) {
        println!("{}", line);
    }
}

/// Natural output size and tier, plus the tier's hint when it has one.
pub fn format_quality(feedback: &QualityFeedback, depth: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}Crop output: {} ({})",
        indent(depth),
        format_dimensions((feedback.natural_width, feedback.natural_height)),
        feedback.tier.label()
    )];
    if let Some(hint) = feedback.tier.hint() {
        lines.push(format!("{}{}", indent(depth + 1), hint));
    }
    lines
}

// ============================================================================
// Crop
// ============================================================================

/// What `crop` produced and where it went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropReport {
    pub file: OutputFile,
    pub dimensions: (u32, u32),
    pub digest: String,
    pub written: Option<PathBuf>,
    pub stored: Option<StoredObject>,
}

impl CropReport {
    pub fn new(file: OutputFile, dimensions: (u32, u32)) -> Self {
        let digest = file.digest();
        Self {
            file,
            dimensions,
            digest,
            written: None,
            stored: None,
        }
    }
}

pub fn format_crop_report(report: &CropReport) -> Vec<String> {
    let file = &report.file;
    let mut lines = vec![file_header(file.file_name(), file.len(), file.media_type())];
    lines.push(format!(
        "{}Output: {}",
        indent(1),
        format_dimensions(report.dimensions)
    ));
    if let Some(path) = &report.written {
        lines.push(format!("{}Written: {}", indent(1), path.display()));
    }
    if let Some(stored) = &report.stored {
        lines.push(format!("{}Stored: {}", indent(1), stored.url));
    }
    lines.push(format!("{}SHA-256: {}", indent(1), report.digest));
    lines
}

pub fn print_crop_report(report: &CropReport) {
    for line in format_crop_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Compress
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_compress_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Started { total } => {
            let noun = if *total == 1 { "file" } else { "files" };
            vec![format!("Compressing {} {}", total, noun)]
        }
        CompressEvent::Compressed {
            index,
            source,
            file_name,
            source_size,
            output_size,
            bytes_in,
            bytes_out,
        } => vec![
            format!("{} {}", format_index(*index), file_name),
            format!("{}Source: {}", indent(1), source.display()),
            format!(
                "{}{} → {} ({} → {})",
                indent(1),
                format_dimensions(*source_size),
                format_dimensions(*output_size),
                format_megabytes(*bytes_in),
                format_megabytes(*bytes_out)
            ),
        ],
        CompressEvent::Failed {
            index,
            source,
            advisory,
            detail,
        } => vec![
            format!("{} ({})", format_index(*index), file_name_of(source)),
            format!("{}{}", indent(1), advisory),
            format!("{}Detail: {}", indent(1), detail),
        ],
    }
}

/// Closing line of a batch.
pub fn format_compress_summary(compressed: usize, failed: usize) -> Vec<String> {
    let mut line = format!(
        "Compressed {} {}",
        compressed,
        if compressed == 1 { "file" } else { "files" }
    );
    if failed > 0 {
        line.push_str(&format!(", {} failed", failed));
    }
    vec![line]
}

pub fn print_compress_summary(compressed: usize, failed: usize) {
    for line in format_compress_summary(compressed, failed) {
        println!("{}", line);
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Advisory first, technical detail indented below.
pub fn format_rejection(error: &PipelineError) -> Vec<String> {
    vec![
        error.advisory(),
        format!("{}Detail: {}", indent(1), error),
    ]
}

pub fn print_rejection(error: &PipelineError) {
    for line in format_rejection(error) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
