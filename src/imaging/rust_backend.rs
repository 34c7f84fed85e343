//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image::load_from_memory_with_format` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Composite onto surface | `image::imageops::overlay` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//!
//! Every pixel-producing call draws onto a freshly allocated opaque
//! [`Surface`] before encoding, so transparent PNG/WebP areas come out
//! black rather than as undefined JPEG data.

use super::backend::{BackendError, Dimensions, EncodedImage, ImageBackend, ResizedImage};
use super::calculations::calculate_compressed_dimensions;
use super::media::MediaType;
use super::params::{CropParams, Quality, ResizeParams, SurfaceLimits};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, Rgba, RgbaImage};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    limits: SurfaceLimits,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SurfaceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SurfaceLimits {
        self.limits
    }
}

/// Off-screen drawing buffer, opaque black until something is drawn.
struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    fn acquire(limits: SurfaceLimits, width: u32, height: u32) -> Result<Self, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::RenderSurfaceUnavailable(format!(
                "{width}x{height} has an empty side"
            )));
        }
        if width > limits.max_side || height > limits.max_side {
            return Err(BackendError::RenderSurfaceUnavailable(format!(
                "{width}x{height} exceeds the {} px side limit",
                limits.max_side
            )));
        }
        let pixels = width as u64 * height as u64;
        if pixels > limits.max_pixels {
            return Err(BackendError::RenderSurfaceUnavailable(format!(
                "{width}x{height} exceeds the {} pixel area limit",
                limits.max_pixels
            )));
        }
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        })
    }

    fn draw(&mut self, img: &DynamicImage) {
        image::imageops::overlay(&mut self.pixels, &img.to_rgba8(), 0, 0);
    }

    fn encode_jpeg(self, quality: Quality) -> Result<EncodedImage, BackendError> {
        let (width, height) = self.pixels.dimensions();
        let rgb = DynamicImage::ImageRgba8(self.pixels).to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.value() as u8)
            .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| BackendError::EncodingFailed(format!("JPEG encode failed: {e}")))?;

        if buf.is_empty() {
            return Err(BackendError::EncodingFailed("encoder produced no data".into()));
        }
        Ok(EncodedImage {
            bytes: Bytes::from(buf),
            width,
            height,
        })
    }
}

/// Decode an in-memory image of a known format.
fn decode(source: &[u8], format: MediaType) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(source, format.image_format())
        .map_err(|e| BackendError::DecodeFailure(format!("{format}: {e}")))
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8], format: MediaType) -> Result<Dimensions, BackendError> {
        let img = decode(source, format)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }

    fn crop(&self, params: &CropParams) -> Result<EncodedImage, BackendError> {
        let mut surface =
            Surface::acquire(self.limits, params.output_width, params.output_height)?;
        let img = decode(&params.source, params.format)?;

        let r = params.region;
        if r.width == 0
            || r.height == 0
            || r.x as u64 + r.width as u64 > img.width() as u64
            || r.y as u64 + r.height as u64 > img.height() as u64
        {
            return Err(BackendError::RenderSurfaceUnavailable(format!(
                "region {}x{}+{}+{} outside {}x{} source",
                r.width,
                r.height,
                r.x,
                r.y,
                img.width(),
                img.height()
            )));
        }

        let cropped = img.crop_imm(r.x, r.y, r.width, r.height);
        let top = if (r.width, r.height) == (params.output_width, params.output_height) {
            cropped
        } else {
            cropped.resize_exact(params.output_width, params.output_height, FilterType::Lanczos3)
        };
        surface.draw(&top);
        surface.encode_jpeg(params.quality)
    }

    fn resize(&self, params: &ResizeParams) -> Result<ResizedImage, BackendError> {
        let img = decode(&params.source, params.format)?;
        let source = Dimensions {
            width: img.width(),
            height: img.height(),
        };
        let (width, height) = calculate_compressed_dimensions(source.as_tuple(), params.max_width);
        let mut surface = Surface::acquire(self.limits, width, height)?;

        let top = if (width, height) == source.as_tuple() {
            img
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };
        surface.draw(&top);
        Ok(ResizedImage {
            encoded: surface.encode_jpeg(params.quality)?,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::calculations::PixelRect;
    use crate::test_helpers::{jpeg_bytes, png_bytes, transparent_png_bytes};

    fn crop_params(source: Bytes, format: MediaType, region: PixelRect) -> CropParams {
        CropParams {
            source,
            format,
            region,
            output_width: region.width,
            output_height: region.height,
            quality: Quality::new(95),
        }
    }

    fn decoded(encoded: &EncodedImage) -> DynamicImage {
        image::load_from_memory_with_format(&encoded.bytes, image::ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let dims = backend
            .identify(&jpeg_bytes(200, 150), MediaType::Jpeg)
            .unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_truncated_payload_is_decode_failure() {
        let bytes = jpeg_bytes(64, 64);
        let truncated = &bytes[..bytes.len() / 3];
        let result = RustBackend::new().identify(truncated, MediaType::Jpeg);
        assert!(matches!(result, Err(BackendError::DecodeFailure(_))));
    }

    #[test]
    fn identify_wrong_format_is_decode_failure() {
        let result = RustBackend::new().identify(&png_bytes(10, 10), MediaType::Jpeg);
        assert!(matches!(result, Err(BackendError::DecodeFailure(_))));
    }

    #[test]
    fn crop_produces_jpeg_of_region_size() {
        let region = PixelRect {
            x: 30,
            y: 45,
            width: 60,
            height: 90,
        };
        let encoded = RustBackend::new()
            .crop(&crop_params(
                Bytes::from(jpeg_bytes(200, 300)),
                MediaType::Jpeg,
                region,
            ))
            .unwrap();

        assert_eq!((encoded.width, encoded.height), (60, 90));
        assert_eq!(&encoded.bytes[..3], &[0xFF, 0xD8, 0xFF]);
        let img = decoded(&encoded);
        assert_eq!((img.width(), img.height()), (60, 90));
    }

    #[test]
    fn crop_resamples_to_requested_output_size() {
        let region = PixelRect {
            x: 0,
            y: 0,
            width: 100,
            height: 150,
        };
        let mut params = crop_params(Bytes::from(png_bytes(100, 150)), MediaType::Png, region);
        params.output_width = 40;
        params.output_height = 60;

        let encoded = RustBackend::new().crop(&params).unwrap();
        assert_eq!((encoded.width, encoded.height), (40, 60));
    }

    #[test]
    fn crop_flattens_transparency_onto_black() {
        let region = PixelRect {
            x: 0,
            y: 0,
            width: 20,
            height: 30,
        };
        let encoded = RustBackend::new()
            .crop(&crop_params(
                Bytes::from(transparent_png_bytes(20, 30)),
                MediaType::Png,
                region,
            ))
            .unwrap();

        let px = decoded(&encoded).to_rgb8().get_pixel(10, 15).0;
        assert!(px.iter().all(|&c| c < 16), "expected near-black, got {px:?}");
    }

    #[test]
    fn crop_region_outside_source_is_rejected() {
        let region = PixelRect {
            x: 150,
            y: 0,
            width: 100,
            height: 150,
        };
        let result = RustBackend::new().crop(&crop_params(
            Bytes::from(jpeg_bytes(200, 300)),
            MediaType::Jpeg,
            region,
        ));
        assert!(matches!(
            result,
            Err(BackendError::RenderSurfaceUnavailable(_))
        ));
    }

    #[test]
    fn surface_over_side_limit_is_unavailable() {
        let backend = RustBackend::with_limits(SurfaceLimits {
            max_side: 50,
            max_pixels: 1_000_000,
        });
        let region = PixelRect {
            x: 0,
            y: 0,
            width: 60,
            height: 90,
        };
        let result = backend.crop(&crop_params(
            Bytes::from(jpeg_bytes(60, 90)),
            MediaType::Jpeg,
            region,
        ));
        assert!(matches!(
            result,
            Err(BackendError::RenderSurfaceUnavailable(_))
        ));
    }

    #[test]
    fn surface_over_area_limit_is_unavailable() {
        let backend = RustBackend::with_limits(SurfaceLimits {
            max_side: 1000,
            max_pixels: 100,
        });
        let result = backend.resize(&ResizeParams {
            source: Bytes::from(jpeg_bytes(20, 20)),
            format: MediaType::Jpeg,
            max_width: 20,
            quality: Quality::new(70),
        });
        assert!(matches!(
            result,
            Err(BackendError::RenderSurfaceUnavailable(_))
        ));
    }

    #[test]
    fn zero_sized_surface_is_unavailable() {
        let result = RustBackend::new().resize(&ResizeParams {
            source: Bytes::from(jpeg_bytes(20, 20)),
            format: MediaType::Jpeg,
            max_width: 0,
            quality: Quality::new(70),
        });
        assert!(matches!(
            result,
            Err(BackendError::RenderSurfaceUnavailable(_))
        ));
    }

    #[test]
    fn resize_synthetic_to_jpeg() {
        let resized = RustBackend::new()
            .resize(&ResizeParams {
                source: Bytes::from(png_bytes(400, 600)),
                format: MediaType::Png,
                max_width: 200,
                quality: Quality::new(70),
            })
            .unwrap();

        assert_eq!(resized.source.as_tuple(), (400, 600));
        let img = decoded(&resized.encoded);
        assert_eq!((img.width(), img.height()), (200, 300));
    }

    #[test]
    fn resize_within_bound_keeps_size() {
        let resized = RustBackend::new()
            .resize(&ResizeParams {
                source: Bytes::from(jpeg_bytes(90, 60)),
                format: MediaType::Jpeg,
                max_width: 200,
                quality: Quality::new(70),
            })
            .unwrap();

        assert_eq!(resized.source.as_tuple(), (90, 60));
        assert_eq!((resized.encoded.width, resized.encoded.height), (90, 60));
    }

    #[test]
    fn lower_quality_yields_smaller_output() {
        let source = Bytes::from(jpeg_bytes(300, 300));
        let encode = |q| {
            RustBackend::new()
                .resize(&ResizeParams {
                    source: source.clone(),
                    format: MediaType::Jpeg,
                    max_width: 300,
                    quality: Quality::new(q),
                })
                .unwrap()
                .encoded
                .bytes
                .len()
        };
        assert!(encode(20) < encode(95));
    }
}
