//! Source acquisition: turns a picker/drop batch into one validated
//! [`RawImageSource`].
//!
//! Checks run in a fixed order, all before any decode:
//!
//! 1. Batch non-empty. The first file wins; the rest are discarded.
//! 2. Media type, from the declared MIME type, else the file extension,
//!    must be on the allow-list.
//! 3. When sniffing is enabled, the magic bytes must not contradict it.
//! 4. Byte length must not exceed the configured ceiling.
//!
//! A rejected candidate never reaches the preview renderer.

use crate::config::AcquisitionConfig;
use crate::imaging::{MediaType, Sniffed};
use bytes::Bytes;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("no file selected")]
    NoFile,
    #[error("{file_name}: unsupported media type {detected}")]
    UnsupportedMediaType { file_name: String, detected: String },
    #[error("file is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identifies one selection. A newer id supersedes every older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AcquisitionId(pub u64);

impl fmt::Display for AcquisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One file as handed over by a picker, a drop, or the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub file_name: String,
    /// MIME type reported by the source, if any. Disk reads have none.
    pub declared_type: Option<String>,
    pub bytes: Bytes,
}

/// An accepted image, validated but not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImageSource {
    pub bytes: Bytes,
    pub media_type: MediaType,
    pub byte_len: u64,
    pub file_name: String,
}

/// Accept the first candidate of a batch, or explain why not.
pub fn acquire(
    candidates: Vec<CandidateFile>,
    config: &AcquisitionConfig,
) -> Result<RawImageSource, AcquireError> {
    let mut batch = candidates.into_iter();
    let first = batch.next().ok_or(AcquireError::NoFile)?;
    for discarded in batch {
        debug!(
            "Discarding {} (only the first file of a batch is used)",
            discarded.file_name
        );
    }

    validate(first, config).inspect_err(|e| warn!("Rejected source: {e}"))
}

/// Validate a single candidate against the acquisition policy.
pub fn validate(
    candidate: CandidateFile,
    config: &AcquisitionConfig,
) -> Result<RawImageSource, AcquireError> {
    let media_type = resolve_media_type(&candidate.file_name, candidate.declared_type.as_deref())?;
    check_allowed(&candidate.file_name, media_type, config)?;

    if config.sniff_content {
        check_content(&candidate, media_type)?;
    }

    let byte_len = candidate.bytes.len() as u64;
    check_size(byte_len, config)?;

    info!(
        "Accepted {} ({media_type}, {byte_len} bytes)",
        candidate.file_name
    );
    Ok(RawImageSource {
        bytes: candidate.bytes,
        media_type,
        byte_len,
        file_name: candidate.file_name,
    })
}

/// Read a file from disk as a candidate.
///
/// The extension and the file size are checked against the policy before
/// the body is read, so an oversized file is never loaded.
pub async fn read_candidate(
    path: &Path,
    config: &AcquisitionConfig,
) -> Result<CandidateFile, AcquireError> {
    let file_name = precheck_path(path, config)?;
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| read_error(path, e))?;
    check_size(metadata.len(), config)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| read_error(path, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(CandidateFile {
        file_name,
        declared_type: None,
        bytes: Bytes::from(bytes),
    })
}

/// [`read_candidate`] for callers already on a worker thread.
pub fn read_candidate_blocking(
    path: &Path,
    config: &AcquisitionConfig,
) -> Result<CandidateFile, AcquireError> {
    let file_name = precheck_path(path, config)?;
    let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;
    check_size(metadata.len(), config)?;

    let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(CandidateFile {
        file_name,
        declared_type: None,
        bytes: Bytes::from(bytes),
    })
}

/// Name and extension checks that need no I/O.
fn precheck_path(path: &Path, config: &AcquisitionConfig) -> Result<String, AcquireError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let media_type = resolve_media_type(&file_name, None)?;
    check_allowed(&file_name, media_type, config)?;
    Ok(file_name)
}

fn read_error(path: &Path, source: std::io::Error) -> AcquireError {
    AcquireError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn resolve_media_type(file_name: &str, declared: Option<&str>) -> Result<MediaType, AcquireError> {
    let unsupported = |detected: &str| AcquireError::UnsupportedMediaType {
        file_name: file_name.to_string(),
        detected: detected.to_string(),
    };

    match declared.map(str::trim).filter(|d| !d.is_empty()) {
        Some(mime) => MediaType::from_mime(mime).ok_or_else(|| unsupported(mime)),
        None => MediaType::from_file_name(file_name).ok_or_else(|| {
            let ext = file_name
                .rsplit_once('.')
                .map(|(_, e)| format!(".{e}"))
                .unwrap_or_else(|| "(no extension)".to_string());
            unsupported(&ext)
        }),
    }
}

fn check_allowed(
    file_name: &str,
    media_type: MediaType,
    config: &AcquisitionConfig,
) -> Result<(), AcquireError> {
    if config.allowed_types.contains(&media_type) {
        Ok(())
    } else {
        Err(AcquireError::UnsupportedMediaType {
            file_name: file_name.to_string(),
            detected: media_type.mime().to_string(),
        })
    }
}

/// Magic bytes must agree with the declared type. An unrecognised
/// signature is left for the decoder to judge.
fn check_content(candidate: &CandidateFile, declared: MediaType) -> Result<(), AcquireError> {
    let detected = match MediaType::sniff(&candidate.bytes) {
        Sniffed::Image(actual) if actual == declared => return Ok(()),
        Sniffed::Unknown => return Ok(()),
        Sniffed::Image(actual) => actual.mime(),
        Sniffed::OtherImage(mime) | Sniffed::NotImage(mime) => mime,
    };
    Err(AcquireError::UnsupportedMediaType {
        file_name: candidate.file_name.clone(),
        detected: format!("{detected} (declared {declared})"),
    })
}

fn check_size(size: u64, config: &AcquisitionConfig) -> Result<(), AcquireError> {
    if size > config.max_bytes {
        Err(AcquireError::PayloadTooLarge {
            size,
            limit: config.max_bytes,
        })
    } else {
        Ok(())
    }
}
