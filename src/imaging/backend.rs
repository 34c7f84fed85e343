//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend
//! must support: identify (decode and measure), crop, and resize. Both
//! pixel-producing operations emit JPEG.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{CropParams, ResizeParams};
use super::media::MediaType;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("could not decode image: {0}")]
    DecodeFailure(String),
    #[error("render surface unavailable: {0}")]
    RenderSurfaceUnavailable(String),
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

/// Natural pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A freshly encoded JPEG and the size it decodes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

/// A resized JPEG together with the size of the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizedImage {
    pub encoded: EncodedImage,
    pub source: Dimensions,
}

/// Trait for image processing backends.
///
/// Every backend must implement all three operations so the pipeline stays
/// backend-agnostic. Implementations allocate their own buffers per call;
/// nothing is shared between calls.
pub trait ImageBackend: Sync {
    /// Decode `source` and report its natural dimensions.
    ///
    /// A full decode, not a header peek: a truncated file must fail here,
    /// before the user starts cropping.
    fn identify(&self, source: &[u8], format: MediaType) -> Result<Dimensions, BackendError>;

    /// Cut `params.region` out of the source and encode it as JPEG.
    fn crop(&self, params: &CropParams) -> Result<EncodedImage, BackendError>;

    /// Bound the whole source to `params.max_width` and encode it as JPEG.
    ///
    /// Decodes once; the source size comes from that same decode.
    fn resize(&self, params: &ResizeParams) -> Result<ResizedImage, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::{PixelRect, calculate_compressed_dimensions};
    use crate::imaging::params::Quality;
    use std::sync::Mutex;

    /// Payload the mock returns for every encode.
    pub const MOCK_JPEG: &[u8] = b"\xFF\xD8\xFFmock-jpeg\xFF\xD9";

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and can cross blocking tasks.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Result<Dimensions, BackendError>>>,
        pub encode_failure: Mutex<Option<BackendError>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify {
            len: usize,
            format: MediaType,
        },
        Crop {
            region: PixelRect,
            output_width: u32,
            output_height: u32,
            quality: u32,
        },
        Resize {
            len: usize,
            max_width: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims.into_iter().map(Ok).collect()),
                ..Self::default()
            }
        }

        pub fn failing_identify(error: BackendError) -> Self {
            Self {
                identify_results: Mutex::new(vec![Err(error)]),
                ..Self::default()
            }
        }

        pub fn failing_encode(self, error: BackendError) -> Self {
            *self.encode_failure.lock().unwrap() = Some(error);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn encoded(&self, width: u32, height: u32) -> Result<EncodedImage, BackendError> {
            if let Some(error) = self.encode_failure.lock().unwrap().clone() {
                return Err(error);
            }
            Ok(EncodedImage {
                bytes: Bytes::from_static(MOCK_JPEG),
                width,
                height,
            })
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, source: &[u8], format: MediaType) -> Result<Dimensions, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Identify {
                len: source.len(),
                format,
            });

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BackendError::DecodeFailure("No mock dimensions".into())))
        }

        fn crop(&self, params: &CropParams) -> Result<EncodedImage, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Crop {
                region: params.region,
                output_width: params.output_width,
                output_height: params.output_height,
                quality: params.quality.value(),
            });
            self.encoded(params.output_width, params.output_height)
        }

        /// Takes its source size from the same queue as `identify`.
        fn resize(&self, params: &ResizeParams) -> Result<ResizedImage, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                len: params.source.len(),
                max_width: params.max_width,
                quality: params.quality.value(),
            });
            let source = self
                .identify_results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BackendError::DecodeFailure("No mock dimensions".into())))?;
            let (width, height) =
                calculate_compressed_dimensions(source.as_tuple(), params.max_width);
            Ok(ResizedImage {
                encoded: self.encoded(width, height)?,
                source,
            })
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 1200,
        }]);

        let result = backend.identify(b"abc", MediaType::Png).unwrap();
        assert_eq!(result.as_tuple(), (800, 1200));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Identify {
                len: 3,
                format: MediaType::Png
            }
        ));
    }

    #[test]
    fn mock_identify_without_results_fails_to_decode() {
        let backend = MockBackend::new();
        assert!(matches!(
            backend.identify(b"", MediaType::Jpeg),
            Err(BackendError::DecodeFailure(_))
        ));
    }

    #[test]
    fn mock_records_crop() {
        let backend = MockBackend::new();
        let region = PixelRect {
            x: 10,
            y: 20,
            width: 300,
            height: 450,
        };

        let encoded = backend
            .crop(&CropParams {
                source: Bytes::from_static(b"src"),
                format: MediaType::Jpeg,
                region,
                output_width: 300,
                output_height: 450,
                quality: Quality::new(95),
            })
            .unwrap();

        assert_eq!((encoded.width, encoded.height), (300, 450));
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Crop {
                output_width: 300,
                output_height: 450,
                quality: 95,
                ..
            }
        ));
    }

    #[test]
    fn mock_encode_failure_is_reported() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 10,
            height: 10,
        }])
        .failing_encode(BackendError::EncodingFailed("boom".into()));
        let result = backend.resize(&ResizeParams {
            source: Bytes::from_static(b"src"),
            format: MediaType::Jpeg,
            max_width: 10,
            quality: Quality::new(70),
        });
        assert_eq!(result, Err(BackendError::EncodingFailed("boom".into())));
    }

    #[test]
    fn mock_resize_reports_source_and_bound_size() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 2400,
            height: 3600,
        }]);
        let resized = backend
            .resize(&ResizeParams {
                source: Bytes::from_static(b"src"),
                format: MediaType::Png,
                max_width: 1200,
                quality: Quality::new(70),
            })
            .unwrap();
        assert_eq!(resized.source.as_tuple(), (2400, 3600));
        assert_eq!((resized.encoded.width, resized.encoded.height), (1200, 1800));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Resize {
                len: 3,
                max_width: 1200,
                quality: 70
            }]
        );
    }
}
