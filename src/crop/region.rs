//! Drag handles and the geometry of moving them.
//!
//! Every function here takes a region and returns a new one; nothing is
//! mutated in place. All results are aspect-locked and inside the bounds.
//!
//! | Handle | Behaviour |
//! |---|---|
//! | Corners | Pointer extent projected onto the aspect vector `(a, 1)`; opposite corner stays put |
//! | Edges | Drive one dimension; the other follows the aspect and stays centred |
//! | Body | Translate, with the delta clamped so the region stays inside |

use crate::imaging::Rect;
use crate::imaging::calculations::{clamp_region, min_region_width};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A grab point on the crop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    Body,
}

impl Handle {
    pub const ALL: [Handle; 9] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
        Handle::Top,
        Handle::Bottom,
        Handle::Left,
        Handle::Right,
        Handle::Body,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Handle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|h| h.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|h| h.name()).collect();
                format!("unknown handle '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// The fixed parameters a region is constrained by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    /// Display size `(width, height)`.
    pub bounds: (f64, f64),
    /// `width / height`.
    pub aspect: f64,
    /// Smallest region width, derived from the minimum side.
    pub min_width: f64,
}

impl CropGeometry {
    pub fn new(bounds: (f64, f64), aspect: f64, min_side: f64) -> Self {
        Self {
            bounds,
            aspect,
            min_width: min_region_width(min_side, aspect),
        }
    }

    /// Re-lock and re-clamp an arbitrary region. Width drives.
    pub fn settle(&self, region: Rect) -> Rect {
        clamp_region(region, self.bounds, self.aspect, self.min_width)
    }

    /// Width bounds for a region whose growth is limited to `max_w`.
    fn width_range(&self, max_w: f64) -> (f64, f64) {
        (self.min_width.min(max_w), max_w.max(0.0))
    }
}

/// Move `handle` by `(dx, dy)` display units.
pub fn apply_drag(region: Rect, handle: Handle, delta: (f64, f64), geom: &CropGeometry) -> Rect {
    let moved = match handle {
        Handle::Body => translate(region, delta, geom),
        Handle::Left | Handle::Right => drag_vertical_edge(region, handle, delta.0, geom),
        Handle::Top | Handle::Bottom => drag_horizontal_edge(region, handle, delta.1, geom),
        corner => drag_corner(region, corner, delta, geom),
    };
    geom.settle(moved)
}

/// Rescale a region when the display size changes, then re-lock.
pub fn rescale(region: Rect, from: (f64, f64), to: (f64, f64), geom: &CropGeometry) -> Rect {
    let (sx, sy) = (to.0 / from.0, to.1 / from.1);
    let scaled = Rect::new(
        region.x * sx,
        region.y * sy,
        region.width * sx,
        region.height * sy,
    );
    geom.settle(scaled)
}

fn translate(r: Rect, (dx, dy): (f64, f64), geom: &CropGeometry) -> Rect {
    let (bw, bh) = geom.bounds;
    let dx = dx.clamp(-r.x, (bw - r.right()).max(-r.x));
    let dy = dy.clamp(-r.y, (bh - r.bottom()).max(-r.y));
    Rect::new(r.x + dx, r.y + dy, r.width, r.height)
}

fn drag_corner(r: Rect, handle: Handle, (dx, dy): (f64, f64), geom: &CropGeometry) -> Rect {
    let (bw, bh) = geom.bounds;
    let a = geom.aspect;

    // Anchor is the opposite corner. `grows_right`/`grows_down` say which
    // way the region extends from it.
    let (grows_right, grows_down) = match handle {
        Handle::TopLeft => (false, false),
        Handle::TopRight => (true, false),
        Handle::BottomLeft => (false, true),
        _ => (true, true),
    };
    let anchor_x = if grows_right { r.x } else { r.right() };
    let anchor_y = if grows_down { r.y } else { r.bottom() };

    let raw_w = if grows_right { r.width + dx } else { r.width - dx };
    let raw_h = if grows_down { r.height + dy } else { r.height - dy };

    let room_x = if grows_right { bw - anchor_x } else { anchor_x };
    let room_y = if grows_down { bh - anchor_y } else { anchor_y };
    let (min_w, max_w) = geom.width_range(room_x.min(room_y * a));

    // Project (raw_w, raw_h) onto (a, 1).
    let lambda = (raw_w * a + raw_h) / (a * a + 1.0);
    let width = (a * lambda).clamp(min_w, max_w);
    let height = width / a;

    let x = if grows_right { anchor_x } else { anchor_x - width };
    let y = if grows_down { anchor_y } else { anchor_y - height };
    Rect::new(x, y, width, height)
}

fn drag_vertical_edge(r: Rect, handle: Handle, dx: f64, geom: &CropGeometry) -> Rect {
    let (bw, bh) = geom.bounds;
    let a = geom.aspect;
    let grows_right = handle == Handle::Right;

    let anchor_x = if grows_right { r.x } else { r.right() };
    let room_x = if grows_right { bw - anchor_x } else { anchor_x };
    let (min_w, max_w) = geom.width_range(room_x.min(bh * a));

    let raw_w = if grows_right { r.width + dx } else { r.width - dx };
    let width = raw_w.clamp(min_w, max_w);
    let height = width / a;

    let x = if grows_right { anchor_x } else { anchor_x - width };
    let (_, cy) = r.center();
    let y = (cy - height / 2.0).clamp(0.0, (bh - height).max(0.0));
    Rect::new(x, y, width, height)
}

fn drag_horizontal_edge(r: Rect, handle: Handle, dy: f64, geom: &CropGeometry) -> Rect {
    let (bw, bh) = geom.bounds;
    let a = geom.aspect;
    let grows_down = handle == Handle::Bottom;

    let anchor_y = if grows_down { r.y } else { r.bottom() };
    let room_y = if grows_down { bh - anchor_y } else { anchor_y };
    let (min_w, max_w) = geom.width_range((room_y * a).min(bw));

    let raw_h = if grows_down { r.height + dy } else { r.height - dy };
    let width = (raw_h * a).clamp(min_w, max_w);
    let height = width / a;

    let y = if grows_down { anchor_y } else { anchor_y - height };
    let (cx, _) = r.center();
    let x = (cx - width / 2.0).clamp(0.0, (bw - width).max(0.0));
    Rect::new(x, y, width, height)
}
