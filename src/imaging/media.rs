//! Media types accepted by the pipeline.
//!
//! The allow-list is JPEG, PNG and WEBP, the same set the upload dropzone
//! advertises (`.jpeg`, `.jpg`, `.png`, `.webp`). Output is always JPEG.
//!
//! A media type can come from three places, in decreasing order of trust:
//!
//! | Source | Function |
//! |---|---|
//! | Magic bytes | [`MediaType::sniff`] (`infer` crate) |
//! | Declared MIME type | [`MediaType::from_mime`] |
//! | File extension | [`MediaType::from_file_name`] |

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Jpeg, MediaType::Png, MediaType::Webp];

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Extensions (lowercase, no dot) that map to this type.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::Webp => &["webp"],
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
        }
    }

    /// Parse a MIME type string. Parameters (`; charset=...`) and case are
    /// ignored; the non-standard `image/jpg` alias is accepted.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|t| t.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Media type implied by the last extension of `name`, if any.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        if ext.contains('/') {
            return None;
        }
        Self::from_extension(ext)
    }

    /// Identify the payload from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Sniffed {
        match infer::get(bytes) {
            None => Sniffed::Unknown,
            Some(kind) if kind.matcher_type() != infer::MatcherType::Image => {
                Sniffed::NotImage(kind.mime_type())
            }
            Some(kind) => match Self::from_mime(kind.mime_type()) {
                Some(media) => Sniffed::Image(media),
                None => Sniffed::OtherImage(kind.mime_type()),
            },
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Outcome of magic-byte sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    /// One of the allow-listed types.
    Image(MediaType),
    /// An image, but not one we accept (GIF, BMP, ...).
    OtherImage(&'static str),
    /// Recognised, and not an image at all.
    NotImage(&'static str),
    /// Signature not recognised.
    Unknown,
}
