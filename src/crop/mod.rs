//! Crop engine: an explicit state machine over the crop session.
//!
//! ```text
//!            SourceAccepted              ImageDecoded
//!   Idle ─────────────────▶ ImageLoading ────────────▶ CropReady ◀──┐
//!    ▲                          │                      │  ▲   │     │ DragReleased
//!    └──────── DecodeFailed ────┘         DragStarted  │  │   │     │
//!                                                      ▼  │   │  Cropping
//!                                          Confirm ◀───┘  │   └─────▶ (DragMoved)
//!                                             │           │ EncodeFailed
//!                                             ▼           │
//!                                       CropConfirmed ────┘
//!
//!   Cancel from any state → CropCancelled
//! ```
//!
//! [`CropEngine::dispatch`] is the only way state changes. An event that
//! does not apply to the current state is an
//! [`InvalidTransition`](CropError::InvalidTransition) and leaves the state
//! untouched. An [`ImageDecoded`](CropEvent::ImageDecoded) or
//! [`DecodeFailed`](CropEvent::DecodeFailed) for an acquisition that is no
//! longer loading is [`Stale`](Transition::Stale) and ignored.

pub mod region;

use crate::acquire::AcquisitionId;
use crate::config::PipelineConfig;
use crate::imaging::calculations::{classify_quality, display_to_natural};
use crate::imaging::{AspectRatio, PixelRect, QualityThresholds, QualityTier, Rect};
use crate::preview::DisplayedImage;
use log::debug;
use region::{CropGeometry, apply_drag, rescale};
use serde::Serialize;
use thiserror::Error;

pub use region::Handle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("cannot apply {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("crop is {width}x{height} px, shorter side must be at least {min_side} px")]
    TooSmall {
        width: u32,
        height: u32,
        min_side: u32,
    },
    #[error("no image is loaded")]
    NoImage,
    #[error("display size {width}x{height} is not usable")]
    InvalidDisplaySize { width: f64, height: f64 },
}

/// The crop region at the moment it last settled, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletedCrop(pub Rect);

impl CompletedCrop {
    pub fn region(&self) -> Rect {
        self.0
    }
}

/// Everything the engine knows about the loaded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    pub id: AcquisitionId,
    pub displayed: DisplayedImage,
    pub region: Rect,
    pub completed: CompletedCrop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropState {
    Idle,
    ImageLoading { id: AcquisitionId },
    CropReady(Workspace),
    Cropping { workspace: Workspace, handle: Handle },
    CropConfirmed(Workspace),
    CropCancelled,
}

impl CropState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ImageLoading { .. } => "image-loading",
            Self::CropReady(_) => "crop-ready",
            Self::Cropping { .. } => "cropping",
            Self::CropConfirmed(_) => "crop-confirmed",
            Self::CropCancelled => "crop-cancelled",
        }
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        match self {
            Self::CropReady(ws) | Self::CropConfirmed(ws) => Some(ws),
            Self::Cropping { workspace, .. } => Some(workspace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropEvent {
    SourceAccepted(AcquisitionId),
    ImageDecoded {
        id: AcquisitionId,
        displayed: DisplayedImage,
        region: Rect,
    },
    DecodeFailed(AcquisitionId),
    DisplayResized { width: f64, height: f64 },
    DragStarted(Handle),
    DragMoved { dx: f64, dy: f64 },
    DragReleased,
    SetRegion(Rect),
    Confirm,
    EncodeFailed,
    Cancel,
}

impl CropEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceAccepted(_) => "source-accepted",
            Self::ImageDecoded { .. } => "image-decoded",
            Self::DecodeFailed(_) => "decode-failed",
            Self::DisplayResized { .. } => "display-resized",
            Self::DragStarted(_) => "drag-started",
            Self::DragMoved { .. } => "drag-moved",
            Self::DragReleased => "drag-released",
            Self::SetRegion(_) => "set-region",
            Self::Confirm => "confirm",
            Self::EncodeFailed => "encode-failed",
            Self::Cancel => "cancel",
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The event belonged to a superseded acquisition.
    Stale,
}

/// Crop constraints, resolved from config once per session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPolicy {
    pub aspect: AspectRatio,
    pub min_display_side: f64,
    pub min_output_side: u32,
    pub thresholds: QualityThresholds,
}

impl CropPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            aspect: config.crop.aspect(),
            min_display_side: config.crop.min_display_side,
            min_output_side: config.crop.min_output_side,
            thresholds: config.quality_tiers.thresholds(),
        }
    }

    fn geometry(&self, display: (f64, f64)) -> CropGeometry {
        CropGeometry::new(display, self.aspect.value(), self.min_display_side)
    }
}

impl Default for CropPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Advisory size feedback for the live region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityFeedback {
    pub natural_width: u32,
    pub natural_height: u32,
    pub tier: QualityTier,
}

#[derive(Debug, Clone)]
pub struct CropEngine {
    policy: CropPolicy,
    state: CropState,
}

impl CropEngine {
    pub fn new(policy: CropPolicy) -> Self {
        Self {
            policy,
            state: CropState::Idle,
        }
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }

    /// The live region, if an image is loaded.
    pub fn region(&self) -> Option<Rect> {
        self.state.workspace().map(|ws| ws.region)
    }

    pub fn completed_crop(&self) -> Option<CompletedCrop> {
        self.state.workspace().map(|ws| ws.completed)
    }

    /// The confirmed crop, only while in `CropConfirmed`.
    pub fn confirmed(&self) -> Option<&Workspace> {
        match &self.state {
            CropState::CropConfirmed(ws) => Some(ws),
            _ => None,
        }
    }

    /// Apply one event.
    pub fn dispatch(&mut self, event: CropEvent) -> Result<Transition, CropError> {
        let outcome = self.reduce(event);
        match &outcome {
            Ok((Some(next), _)) => {
                debug!(
                    "Crop {} --{}--> {}",
                    self.state.name(),
                    event.name(),
                    next.name()
                );
                self.state = *next;
            }
            Ok((None, _)) => debug!(
                "Crop ignored stale {} while {}",
                event.name(),
                self.state.name()
            ),
            Err(e) => debug!("Crop rejected {}: {e}", event.name()),
        }
        outcome.map(|(_, transition)| transition)
    }

    /// Compute the next state without touching `self`.
    fn reduce(&self, event: CropEvent) -> Result<(Option<CropState>, Transition), CropError> {
        use CropEvent as E;
        use CropState as S;

        let invalid = || CropError::InvalidTransition {
            state: self.state.name(),
            event: event.name(),
        };
        let applied = |next: CropState| Ok((Some(next), Transition::Applied));
        let stale = Ok((None, Transition::Stale));

        match (self.state, event) {
            (_, E::Cancel) => applied(S::CropCancelled),
            (_, E::SourceAccepted(id)) => applied(S::ImageLoading { id }),

            (S::ImageLoading { id }, E::ImageDecoded { id: got, displayed, region }) if id == got => {
                let display = validated_display(displayed.display.0, displayed.display.1)?;
                let region = self.policy.geometry(display).settle(region);
                applied(S::CropReady(Workspace {
                    id,
                    displayed,
                    region,
                    completed: CompletedCrop(region),
                }))
            }
            (_, E::ImageDecoded { .. }) => stale,

            (S::ImageLoading { id }, E::DecodeFailed(got)) if id == got => applied(S::Idle),
            (_, E::DecodeFailed(_)) => stale,

            (S::CropReady(ws), E::DisplayResized { width, height }) => {
                applied(S::CropReady(self.resized(ws, width, height)?))
            }
            (S::Cropping { workspace, handle }, E::DisplayResized { width, height }) => {
                applied(S::Cropping {
                    workspace: self.resized(workspace, width, height)?,
                    handle,
                })
            }

            (S::CropReady(workspace), E::DragStarted(handle)) => {
                applied(S::Cropping { workspace, handle })
            }
            (S::Cropping { mut workspace, handle }, E::DragMoved { dx, dy }) => {
                if !(dx.is_finite() && dy.is_finite()) {
                    return Err(invalid());
                }
                let geom = self.policy.geometry(workspace.displayed.display);
                workspace.region = apply_drag(workspace.region, handle, (dx, dy), &geom);
                applied(S::Cropping { workspace, handle })
            }
            (S::Cropping { mut workspace, .. }, E::DragReleased) => {
                workspace.completed = CompletedCrop(workspace.region);
                applied(S::CropReady(workspace))
            }

            (S::CropReady(mut ws), E::SetRegion(rect)) => {
                let geom = self.policy.geometry(ws.displayed.display);
                ws.region = geom.settle(rect);
                ws.completed = CompletedCrop(ws.region);
                applied(S::CropReady(ws))
            }

            (S::CropReady(ws), E::Confirm) => {
                let px = natural_region(&ws.displayed, &ws.completed);
                let min_side = self.policy.min_output_side;
                if px.width.min(px.height) < min_side {
                    return Err(CropError::TooSmall {
                        width: px.width,
                        height: px.height,
                        min_side,
                    });
                }
                applied(S::CropConfirmed(ws))
            }
            (S::CropConfirmed(ws), E::EncodeFailed) => applied(S::CropReady(ws)),

            _ => Err(invalid()),
        }
    }

    fn resized(&self, ws: Workspace, width: f64, height: f64) -> Result<Workspace, CropError> {
        let to = validated_display(width, height)?;
        let from = ws.displayed.display;
        let geom = self.policy.geometry(to);
        Ok(Workspace {
            displayed: ws.displayed.with_display(to),
            region: rescale(ws.region, from, to, &geom),
            completed: CompletedCrop(rescale(ws.completed.0, from, to, &geom)),
            ..ws
        })
    }

    /// Natural-resolution size of the live region and its quality tier.
    pub fn quality_feedback(&self) -> Result<QualityFeedback, CropError> {
        let ws = self.state.workspace().ok_or(CropError::NoImage)?;
        let px = natural_region(&ws.displayed, &CompletedCrop(ws.region));
        Ok(QualityFeedback {
            natural_width: px.width,
            natural_height: px.height,
            tier: classify_quality((px.width, px.height), &self.policy.thresholds),
        })
    }
}

/// Map a completed crop to natural pixels using the current scale.
pub fn natural_region(displayed: &DisplayedImage, crop: &CompletedCrop) -> PixelRect {
    display_to_natural(&crop.0, displayed.natural, displayed.display)
}

fn validated_display(width: f64, height: f64) -> Result<(f64, f64), CropError> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok((width, height))
    } else {
        Err(CropError::InvalidDisplaySize { width, height })
    }
}
