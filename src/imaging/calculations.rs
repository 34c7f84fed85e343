//! Pure calculation functions for crop geometry and output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Two coordinate spaces are in play:
//!
//! - **Displayed**: `f64` coordinates of the image as rendered on screen.
//!   The crop region lives here.
//! - **Natural**: integer pixel coordinates of the decoded image. The
//!   compositor works here.
//!
//! `scale = natural / displayed`, computed per axis.

use serde::Serialize;

/// Axis-aligned rectangle in displayed coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Rectangle in natural pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Target aspect ratio as `width:height`, both non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn value(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for AspectRatio {
    /// 2:3 portrait, the garment-photo frame.
    fn default() -> Self {
        Self::new(2, 3)
    }
}

/// Largest width an aspect-locked region can have inside `bounds`.
pub fn max_region_width(bounds: (f64, f64), aspect: f64) -> f64 {
    bounds.0.min(bounds.1 * aspect)
}

/// Smallest width that keeps both sides of an aspect-locked region at or
/// above `min_side`.
///
/// For portrait ratios the width is the short side; for landscape ratios
/// the height is, so the width must be `min_side * aspect`.
pub fn min_region_width(min_side: f64, aspect: f64) -> f64 {
    min_side * aspect.max(1.0)
}

/// Initial crop region: centered, aspect-locked, `fill` of the largest
/// region that fits.
///
/// # Examples
/// ```
/// # use dressupmate::imaging::calculations::centered_aspect_region;
/// // 600x1200 display, 2:3, 80% → 480x720 centered
/// let r = centered_aspect_region((600.0, 1200.0), 2.0 / 3.0, 0.8);
/// assert!((r.width - 480.0).abs() < 1e-9);
/// assert!((r.height - 720.0).abs() < 1e-9);
/// assert!((r.y - 240.0).abs() < 1e-9);
/// ```
pub fn centered_aspect_region(bounds: (f64, f64), aspect: f64, fill: f64) -> Rect {
    let (bw, bh) = bounds;
    let width = max_region_width(bounds, aspect) * fill;
    let height = width / aspect;
    Rect::new((bw - width) / 2.0, (bh - height) / 2.0, width, height)
}

/// Bring a region back inside `bounds` with the aspect ratio re-locked.
///
/// Width is the driving dimension: it is clamped to `[min_width, max]`
/// (the minimum gives way when the image itself is smaller), height is
/// derived from it, then the origin is clamped so the region fits.
pub fn clamp_region(region: Rect, bounds: (f64, f64), aspect: f64, min_width: f64) -> Rect {
    let (bw, bh) = bounds;
    let max_w = max_region_width(bounds, aspect);
    let width = region.width.max(min_width.min(max_w)).min(max_w);
    let height = (width / aspect).min(bh);
    let x = region.x.clamp(0.0, (bw - width).max(0.0));
    let y = region.y.clamp(0.0, (bh - height).max(0.0));
    Rect::new(x, y, width, height)
}

/// Per-axis scale factors from displayed to natural coordinates.
pub fn scale_factors(natural: (u32, u32), display: (f64, f64)) -> (f64, f64) {
    (
        natural.0 as f64 / display.0,
        natural.1 as f64 / display.1,
    )
}

/// Map a displayed-space rectangle to natural pixels.
///
/// Each component is rounded to the nearest pixel, then clamped so the
/// result stays inside the natural image.
pub fn display_to_natural(rect: &Rect, natural: (u32, u32), display: (f64, f64)) -> PixelRect {
    let (sx, sy) = scale_factors(natural, display);
    let (nw, nh) = natural;
    let to_px = |v: f64| v.round().max(0.0) as u32;

    let x = to_px(rect.x * sx).min(nw);
    let y = to_px(rect.y * sy).min(nh);
    PixelRect {
        x,
        y,
        width: to_px(rect.width * sx).min(nw - x),
        height: to_px(rect.height * sy).min(nh - y),
    }
}

/// Map natural pixels back to displayed coordinates (inverse of
/// [`display_to_natural`] up to rounding).
pub fn natural_to_display(rect: &PixelRect, natural: (u32, u32), display: (f64, f64)) -> Rect {
    let (sx, sy) = scale_factors(natural, display);
    Rect::new(
        rect.x as f64 / sx,
        rect.y as f64 / sy,
        rect.width as f64 / sx,
        rect.height as f64 / sy,
    )
}

/// Fit an image into a viewport without upscaling.
///
/// Mirrors `max-height` / `max-width` with `width: auto`: one uniform
/// scale, capped at 1.
pub fn fit_within(natural: (u32, u32), viewport: (f64, f64)) -> (f64, f64) {
    let (nw, nh) = (natural.0 as f64, natural.1 as f64);
    let (sx, sy) = (viewport.0 / nw, viewport.1 / nh);
    if sx >= 1.0 && sy >= 1.0 {
        (nw, nh)
    } else if sx <= sy {
        // Width-bound: pin the bound side exactly to the viewport.
        (viewport.0, nh * viewport.0 / nw)
    } else {
        (nw * viewport.1 / nh, viewport.1)
    }
}

/// Output dimensions for bounded-width compression.
///
/// Wider than `max_width` → scaled so width equals `max_width`, height
/// rounded proportionally. Otherwise unchanged.
///
/// # Examples
/// ```
/// # use dressupmate::imaging::calculations::calculate_compressed_dimensions;
/// assert_eq!(calculate_compressed_dimensions((2400, 3600), 1200), (1200, 1800));
/// assert_eq!(calculate_compressed_dimensions((800, 1200), 1200), (800, 1200));
/// ```
pub fn calculate_compressed_dimensions(source: (u32, u32), max_width: u32) -> (u32, u32) {
    let (w, h) = source;
    if w <= max_width {
        return (w, h);
    }
    let height = (h as f64 * max_width as f64 / w as f64).round() as u32;
    (max_width, height.max(1))
}

/// Advisory quality of a crop at natural resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    VeryLow,
    Low,
    Acceptable,
}

impl QualityTier {
    pub fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "very low quality",
            Self::Low => "low quality",
            Self::Acceptable => "acceptable",
        }
    }

    /// Hint for the user, if the tier warrants one.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::VeryLow => Some("select a larger area"),
            Self::Low => Some("enlarge the selection if possible"),
            Self::Acceptable => None,
        }
    }
}

/// Minimum natural sizes below which a crop is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub very_low: (u32, u32),
    pub low: (u32, u32),
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            very_low: (300, 450),
            low: (500, 750),
        }
    }
}

/// Classify a natural-resolution size. Falling short on either axis counts.
pub fn classify_quality(size: (u32, u32), thresholds: &QualityThresholds) -> QualityTier {
    let below = |(min_w, min_h): (u32, u32)| size.0 < min_w || size.1 < min_h;
    if below(thresholds.very_low) {
        QualityTier::VeryLow
    } else if below(thresholds.low) {
        QualityTier::Low
    } else {
        QualityTier::Acceptable
    }
}
