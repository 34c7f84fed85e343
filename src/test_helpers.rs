//! Shared test utilities for the dressupmate test suite.
//!
//! Builds small, valid in-memory images so tests never depend on fixture
//! files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = jpeg_bytes(300, 450);
//! let candidate = candidate("dress.jpg", Some("image/jpeg"), bytes);
//! ```

use crate::acquire::CandidateFile;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Encoded images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A valid baseline JPEG with a gradient fill.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A valid opaque RGB PNG with a gradient fill.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A fully transparent white RGBA PNG.
pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

// =========================================================================
// Candidates
// =========================================================================

/// Wrap bytes as a user-supplied candidate file.
pub fn candidate(file_name: &str, declared_type: Option<&str>, bytes: Vec<u8>) -> CandidateFile {
    CandidateFile {
        file_name: file_name.to_string(),
        declared_type: declared_type.map(str::to_string),
        bytes: Bytes::from(bytes),
    }
}

/// A JPEG candidate named `name` with the declared type set.
pub fn jpeg_candidate(name: &str, width: u32, height: u32) -> CandidateFile {
    candidate(name, Some("image/jpeg"), jpeg_bytes(width, height))
}
