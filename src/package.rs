//! Output packager: wrap encoded bytes into a named [`OutputFile`].
//!
//! The file name's extension must agree with the media type. Packaging is
//! deterministic for a given timestamp: the same raster always yields the
//! same bytes, name, media type and digest.

use crate::compositor::CroppedRaster;
use crate::compress::CompressedImage;
use crate::imaging::MediaType;
use crate::naming;
use crate::preview::format_megabytes;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    #[error("file name {file_name} does not match media type {media_type}")]
    NameMismatch {
        file_name: String,
        media_type: MediaType,
    },
}

/// A finished file, ready for upload or for writing to disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFile {
    #[serde(skip)]
    bytes: Bytes,
    media_type: MediaType,
    file_name: String,
    last_modified: DateTime<Utc>,
}

impl OutputFile {
    pub fn new(
        bytes: Bytes,
        media_type: MediaType,
        file_name: String,
        last_modified: DateTime<Utc>,
    ) -> Result<Self, PackageError> {
        if MediaType::from_file_name(&file_name) != Some(media_type) {
            return Err(PackageError::NameMismatch {
                file_name,
                media_type,
            });
        }
        Ok(Self {
            bytes,
            media_type,
            file_name,
            last_modified,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the content, lowercase hex.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }

    pub fn formatted_size(&self) -> String {
        format_megabytes(self.len())
    }

    /// Write into `dir` under the file's own name.
    pub fn write_into(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Package a cropped raster as `<stem><suffix>.jpg`.
pub fn package_raster(
    raster: &CroppedRaster,
    original_name: &str,
    suffix: &str,
    now: DateTime<Utc>,
) -> Result<OutputFile, PackageError> {
    OutputFile::new(
        raster.bytes.clone(),
        MediaType::Jpeg,
        naming::cropped_file_name(original_name, suffix),
        now,
    )
}

/// Package a compressed image as `<stem>.jpg`.
pub fn package_compressed(
    image: &CompressedImage,
    original_name: &str,
    now: DateTime<Utc>,
) -> Result<OutputFile, PackageError> {
    OutputFile::new(
        image.bytes.clone(),
        MediaType::Jpeg,
        naming::force_jpeg_extension(original_name),
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn raster() -> CroppedRaster {
        CroppedRaster {
            bytes: Bytes::from_static(b"\xFF\xD8\xFFjpeg"),
            width: 300,
            height: 450,
            quality: Quality::new(95),
        }
    }

    #[test]
    fn raster_is_named_after_original() {
        let file = package_raster(&raster(), "summer dress.png", "_cropped", at()).unwrap();
        assert_eq!(file.file_name(), "summer dress_cropped.jpg");
        assert_eq!(file.media_type(), MediaType::Jpeg);
        assert_eq!(file.last_modified(), at());
        assert_eq!(file.len(), 7);
    }

    #[test]
    fn packaging_is_idempotent() {
        let a = package_raster(&raster(), "a.webp", "_cropped", at()).unwrap();
        let b = package_raster(&raster(), "a.webp", "_cropped", at()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn digest_is_sha256_hex() {
        let file = OutputFile::new(Bytes::new(), MediaType::Jpeg, "e.jpg".into(), at()).unwrap();
        assert_eq!(
            file.digest(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(file.is_empty());
    }

    #[test]
    fn mismatched_extension_is_rejected() {
        let result = OutputFile::new(
            Bytes::from_static(b"x"),
            MediaType::Jpeg,
            "shirt.png".into(),
            at(),
        );
        assert_eq!(
            result,
            Err(PackageError::NameMismatch {
                file_name: "shirt.png".into(),
                media_type: MediaType::Jpeg
            })
        );
    }

    #[test]
    fn jpeg_accepts_both_extensions() {
        for name in ["a.jpg", "a.jpeg", "a.JPG"] {
            assert!(OutputFile::new(Bytes::new(), MediaType::Jpeg, name.into(), at()).is_ok());
        }
    }

    #[test]
    fn compressed_gets_jpg_extension() {
        let image = CompressedImage {
            bytes: Bytes::from_static(b"jpeg"),
            width: 1200,
            height: 1800,
            source_width: 2400,
            source_height: 3600,
        };
        let file = package_compressed(&image, "coat.webp", at()).unwrap();
        assert_eq!(file.file_name(), "coat.jpg");
    }

    #[test]
    fn formatted_size_in_megabytes() {
        let file = OutputFile::new(
            Bytes::from(vec![0u8; 3 * 1024 * 1024]),
            MediaType::Jpeg,
            "big.jpg".into(),
            at(),
        )
        .unwrap();
        assert_eq!(file.formatted_size(), "3.00 MB");
    }

    #[test]
    fn write_into_creates_named_file() {
        let tmp = TempDir::new().unwrap();
        let file = package_raster(&raster(), "dress.jpg", "_cropped", at()).unwrap();
        let path = file.write_into(&tmp.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), "dress_cropped.jpg");
        assert_eq!(std::fs::read(path).unwrap(), b"\xFF\xD8\xFFjpeg");
    }

    #[test]
    fn serializes_metadata_without_bytes() {
        let file = package_raster(&raster(), "dress.jpg", "_cropped", at()).unwrap();
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["file_name"], "dress_cropped.jpg");
        assert_eq!(json["media_type"], "image/jpeg");
        assert!(json.get("bytes").is_none());
    }
}
