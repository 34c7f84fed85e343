//! Batch compression of files and directories.
//!
//! Inputs are expanded with `walkdir` (directories recursively, in name
//! order), then every file runs through acquisition, the compression stage
//! and the packager in parallel on the global rayon pool. Progress is
//! reported as [`CompressEvent`]s over an optional channel so a printer
//! thread can show results while work continues.
//!
//! One file failing does not stop the batch; each input gets its own
//! [`BatchOutcome`]. Output names are flat (`<stem>.jpg`), so when two
//! inputs map to the same name the first in input order keeps it and the
//! later ones fail without being compressed.

use crate::acquire::{acquire, read_candidate_blocking};
use crate::compress::{CompressOptions, compress_image};
use crate::config::AcquisitionConfig;
use crate::imaging::{ImageBackend, MediaType};
use crate::naming;
use crate::package::{OutputFile, package_compressed};
use crate::pipeline::PipelineError;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use walkdir::WalkDir;

/// Progress of a running batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CompressEvent {
    Started {
        total: usize,
    },
    Compressed {
        index: usize,
        source: PathBuf,
        file_name: String,
        source_size: (u32, u32),
        output_size: (u32, u32),
        bytes_in: u64,
        bytes_out: u64,
    },
    Failed {
        index: usize,
        source: PathBuf,
        advisory: String,
        detail: String,
    },
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub result: Result<OutputFile, PipelineError>,
}

/// Expand paths into the image files they name.
///
/// Files are kept as given, even with an unsupported extension, so that
/// acquisition reports them. Directories contribute only files whose
/// extension maps to an allowed type.
pub fn collect_inputs(paths: &[PathBuf], allowed: &[MediaType]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| warn!("Skipping unreadable entry: {e}"))
                    .ok()
            })
            .filter(|entry| entry.file_type().is_file())
        {
            match MediaType::from_file_name(&entry.file_name().to_string_lossy()) {
                Some(media_type) if allowed.contains(&media_type) => {
                    inputs.push(entry.into_path())
                }
                _ => debug!("Skipping {}", entry.path().display()),
            }
        }
    }
    inputs
}

/// Compress every input. Outcomes come back in input order.
pub fn compress_files(
    backend: &impl ImageBackend,
    inputs: &[PathBuf],
    acquisition: &AcquisitionConfig,
    options: &CompressOptions,
    now: DateTime<Utc>,
    events: Option<Sender<CompressEvent>>,
) -> Vec<BatchOutcome> {
    let emit = |event: CompressEvent| {
        if let Some(tx) = &events {
            // Receiver may have stopped listening; the batch carries on.
            tx.send(event).ok();
        }
    };
    emit(CompressEvent::Started {
        total: inputs.len(),
    });

    let clashes = output_clashes(inputs);
    inputs
        .par_iter()
        .zip(clashes)
        .enumerate()
        .map(|(index, (source, clash))| {
            let result = match clash {
                Some(err) => Err(err),
                None => compress_one(backend, source, acquisition, options, now),
            };
            emit(match &result {
                Ok((file, sizes)) => CompressEvent::Compressed {
                    index: index + 1,
                    source: source.clone(),
                    file_name: file.file_name().to_string(),
                    source_size: sizes.source_size,
                    output_size: sizes.output_size,
                    bytes_in: sizes.bytes_in,
                    bytes_out: sizes.bytes_out,
                },
                Err(e) => CompressEvent::Failed {
                    index: index + 1,
                    source: source.clone(),
                    advisory: e.advisory(),
                    detail: e.to_string(),
                },
            });
            BatchOutcome {
                source: source.clone(),
                result: result.map(|(file, _)| file),
            }
        })
        .collect()
}

/// Output name an input will be packaged under, if it can be packaged at
/// all. Names are compared case-insensitively: the output directory may be
/// on a case-insensitive filesystem.
fn output_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    MediaType::from_file_name(&name)?;
    Some(naming::force_jpeg_extension(&name))
}

/// For each input, the error to report if an earlier input already claimed
/// its output name.
fn output_clashes(inputs: &[PathBuf]) -> Vec<Option<PipelineError>> {
    let mut claimed: HashMap<String, &Path> = HashMap::new();
    inputs
        .iter()
        .map(|path| {
            let file_name = output_name(path)?;
            match claimed.get(&file_name.to_lowercase()) {
                Some(first) => {
                    warn!(
                        "{} clashes with {} on output name {file_name}",
                        path.display(),
                        first.display()
                    );
                    Some(PipelineError::DuplicateOutput {
                        path: path.clone(),
                        file_name,
                        first: first.to_path_buf(),
                    })
                }
                None => {
                    claimed.insert(file_name.to_lowercase(), path);
                    None
                }
            }
        })
        .collect()
}

/// Sizes reported by a `Compressed` event.
#[derive(Debug, Clone, Copy)]
struct Sizes {
    source_size: (u32, u32),
    output_size: (u32, u32),
    bytes_in: u64,
    bytes_out: u64,
}

fn compress_one(
    backend: &impl ImageBackend,
    path: &Path,
    acquisition: &AcquisitionConfig,
    options: &CompressOptions,
    now: DateTime<Utc>,
) -> Result<(OutputFile, Sizes), PipelineError> {
    let candidate = read_candidate_blocking(path, acquisition)?;
    let source = acquire(vec![candidate], acquisition)?;
    let compressed = compress_image(backend, source.bytes, source.media_type, options)?;
    let file = package_compressed(&compressed, &source.file_name, now)?;

    let sizes = Sizes {
        source_size: (compressed.source_width, compressed.source_height),
        output_size: (compressed.width, compressed.height),
        bytes_in: source.byte_len,
        bytes_out: file.len(),
    };
    Ok((file, sizes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{BackendError, Dimensions, Quality};
    use crate::test_helpers::{jpeg_bytes, png_bytes};
    use chrono::TimeZone;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 2, 18, 0, 0).unwrap()
    }

    fn all_types() -> Vec<MediaType> {
        AcquisitionConfig::default().allowed_types
    }

    // =========================================================================
    // Input collection
    // =========================================================================

    #[test]
    fn directories_are_walked_in_name_order() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("wardrobe");
        std::fs::create_dir_all(dir.join("shoes")).unwrap();
        std::fs::write(dir.join("b.png"), b"").unwrap();
        std::fs::write(dir.join("a.jpg"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();
        std::fs::write(dir.join("shoes").join("c.webp"), b"").unwrap();

        let inputs = collect_inputs(&[dir.clone()], &all_types());
        assert_eq!(
            inputs,
            vec![
                dir.join("a.jpg"),
                dir.join("b.png"),
                dir.join("shoes").join("c.webp"),
            ]
        );
    }

    #[test]
    fn explicit_files_are_kept_as_given() {
        let inputs = collect_inputs(
            &[PathBuf::from("clip.gif"), PathBuf::from("dress.jpg")],
            &all_types(),
        );
        assert_eq!(
            inputs,
            vec![PathBuf::from("clip.gif"), PathBuf::from("dress.jpg")]
        );
    }

    #[test]
    fn directory_walk_respects_allow_list() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.jpg"), b"").unwrap();
        std::fs::write(tmp.path().join("b.png"), b"").unwrap();

        let inputs = collect_inputs(&[tmp.path().to_path_buf()], &[MediaType::Png]);
        assert_eq!(inputs, vec![tmp.path().join("b.png")]);
    }

    // =========================================================================
    // Compression
    // =========================================================================

    #[test]
    fn batch_compresses_and_reports_progress() {
        let tmp = TempDir::new().unwrap();
        let wide = tmp.path().join("coat.png");
        let narrow = tmp.path().join("tee.jpg");
        std::fs::write(&wide, png_bytes(400, 200)).unwrap();
        std::fs::write(&narrow, jpeg_bytes(100, 150)).unwrap();

        let options = CompressOptions {
            max_width: 200,
            quality: Quality::new(70),
        };
        let (tx, rx) = mpsc::channel();
        let outcomes = compress_files(
            &RustBackend::new(),
            &[wide.clone(), narrow.clone()],
            &AcquisitionConfig::default(),
            &options,
            now(),
            Some(tx),
        );

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].source, wide);
        let coat = outcomes[0].result.as_ref().unwrap();
        assert_eq!(coat.file_name(), "coat.jpg");
        assert_eq!(coat.last_modified(), now());
        let tee = outcomes[1].result.as_ref().unwrap();
        assert_eq!(tee.file_name(), "tee.jpg");

        let events: Vec<CompressEvent> = rx.iter().collect();
        assert_eq!(events[0], CompressEvent::Started { total: 2 });
        assert!(events.iter().any(|e| matches!(
            e,
            CompressEvent::Compressed {
                index: 1,
                source_size: (400, 200),
                output_size: (200, 100),
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            CompressEvent::Compressed {
                index: 2,
                source_size: (100, 150),
                output_size: (100, 150),
                ..
            }
        )));
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.jpg");
        std::fs::write(&good, jpeg_bytes(20, 30)).unwrap();
        let missing = tmp.path().join("missing.jpg");
        let gif = tmp.path().join("clip.gif");

        let (tx, rx) = mpsc::channel();
        let outcomes = compress_files(
            &RustBackend::new(),
            &[missing, good, gif],
            &AcquisitionConfig::default(),
            &CompressOptions::default(),
            now(),
            Some(tx),
        );

        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
        assert!(matches!(
            outcomes[2].result,
            Err(PipelineError::Acquire(
                crate::acquire::AcquireError::UnsupportedMediaType { .. }
            ))
        ));

        let failures = rx
            .iter()
            .filter(|e| matches!(e, CompressEvent::Failed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn encode_failure_is_reported_per_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scarf.jpg");
        std::fs::write(&path, jpeg_bytes(8, 8)).unwrap();

        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 8,
            height: 8,
        }])
        .failing_encode(BackendError::EncodingFailed("no blob".into()));
        let outcomes = compress_files(
            &backend,
            &[path],
            &AcquisitionConfig::default(),
            &CompressOptions::default(),
            now(),
            None,
        );
        let err = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(err.advisory(), "Could not encode the image");
    }

    // =========================================================================
    // Output name clashes
    // =========================================================================

    #[test]
    fn same_stem_in_subdirectory_fails_instead_of_overwriting() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("wardrobe");
        std::fs::create_dir_all(dir.join("summer")).unwrap();
        std::fs::write(dir.join("coat.png"), png_bytes(40, 60)).unwrap();
        std::fs::write(dir.join("summer").join("coat.jpg"), jpeg_bytes(20, 30)).unwrap();

        let inputs = collect_inputs(&[dir.clone()], &all_types());
        let (tx, rx) = mpsc::channel();
        let outcomes = compress_files(
            &RustBackend::new(),
            &inputs,
            &AcquisitionConfig::default(),
            &CompressOptions::default(),
            now(),
            Some(tx),
        );

        assert_eq!(outcomes.len(), 2);
        let kept = outcomes[0].result.as_ref().unwrap();
        assert_eq!(kept.file_name(), "coat.jpg");
        match &outcomes[1].result {
            Err(PipelineError::DuplicateOutput {
                path,
                file_name,
                first,
            }) => {
                assert_eq!(path, &dir.join("summer").join("coat.jpg"));
                assert_eq!(file_name, "coat.jpg");
                assert_eq!(first, &dir.join("coat.png"));
            }
            other => panic!("expected a duplicate output, got {other:?}"),
        }

        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let written: Vec<PathBuf> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|file| file.write_into(&out).unwrap())
            .collect();
        assert_eq!(written, vec![out.join("coat.jpg")]);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);

        let events: Vec<CompressEvent> = rx.iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            CompressEvent::Failed { index: 2, advisory, .. }
                if advisory == "Another file in this batch is also saved as coat.jpg"
        )));
    }

    #[test]
    fn output_names_clash_regardless_of_case() {
        let tmp = TempDir::new().unwrap();
        let upper = tmp.path().join("Tee.PNG");
        let lower = tmp.path().join("tee.jpg");
        std::fs::write(&upper, png_bytes(10, 15)).unwrap();
        std::fs::write(&lower, jpeg_bytes(10, 15)).unwrap();

        let outcomes = compress_files(
            &RustBackend::new(),
            &[upper, lower],
            &AcquisitionConfig::default(),
            &CompressOptions::default(),
            now(),
            None,
        );
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(PipelineError::DuplicateOutput { .. })
        ));
    }

    #[test]
    fn unsupported_file_does_not_claim_an_output_name() {
        let tmp = TempDir::new().unwrap();
        let gif = tmp.path().join("clip.gif");
        let png = tmp.path().join("clip.png");
        std::fs::write(&gif, b"GIF89a").unwrap();
        std::fs::write(&png, png_bytes(10, 15)).unwrap();

        let outcomes = compress_files(
            &RustBackend::new(),
            &[gif, png],
            &AcquisitionConfig::default(),
            &CompressOptions::default(),
            now(),
            None,
        );
        assert!(matches!(
            outcomes[0].result,
            Err(PipelineError::Acquire(_))
        ));
        assert_eq!(outcomes[1].result.as_ref().unwrap().file_name(), "clip.jpg");
    }
}
