//! One crop session: acquisition, preview, crop, composite, package.
//!
//! [`CropPipeline`] owns the [`CropEngine`] and the accepted source, and
//! runs decode and encode on tokio's blocking pool. Each selection gets a
//! fresh [`AcquisitionId`]; when a blocking task resolves, its result is
//! applied only if its id is still current.
//!
//! The currency check and the [`CropSink`] callback both happen under the
//! session lock, and [`cancel`](CropPipeline::cancel) takes the same lock.
//! A cancel that lands while an encode is in flight therefore always wins:
//! the encode result is dropped and `on_crop_complete` never fires.
//!
//! The session lock is a `std::sync::Mutex` and is never held across an
//! `.await`.

use crate::acquire::{AcquireError, AcquisitionId, CandidateFile, RawImageSource, acquire};
use crate::compositor::{composite, plan_composite};
use crate::config::{ConfigError, PipelineConfig};
use crate::crop::{
    CompletedCrop, CropEngine, CropError, CropEvent, CropPolicy, CropState, Handle,
    QualityFeedback,
};
use crate::imaging::{BackendError, ImageBackend, MediaType, Rect};
use crate::package::{OutputFile, PackageError, package_raster};
use crate::preview::{Preview, PreviewSummary, render_preview};
use crate::store::StoreError;
use chrono::Utc;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{} would overwrite {file_name} from {}", path.display(), first.display())]
    DuplicateOutput {
        path: PathBuf,
        file_name: String,
        first: PathBuf,
    },
    #[error("background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Short message suitable for showing to the person cropping.
    pub fn advisory(&self) -> String {
        match self {
            Self::Acquire(AcquireError::NoFile) => "Please select an image".into(),
            Self::Acquire(AcquireError::UnsupportedMediaType { .. }) => {
                "Please choose a JPEG, PNG or WEBP image".into()
            }
            Self::Acquire(AcquireError::PayloadTooLarge { limit, .. }) => {
                format!("File is too large (max {} MB)", limit.div_ceil(MIB))
            }
            Self::Acquire(AcquireError::Read { .. }) => "Could not read the file".into(),
            Self::Backend(BackendError::DecodeFailure(_)) => "Could not load the image".into(),
            Self::Backend(BackendError::RenderSurfaceUnavailable(_)) => {
                "Image is too large to process".into()
            }
            Self::Backend(BackendError::EncodingFailed(_)) => {
                "Could not encode the image".into()
            }
            Self::Crop(CropError::TooSmall { .. }) => "Please select a larger area".into(),
            Self::Crop(CropError::NoImage) => "Please select an image first".into(),
            Self::Crop(CropError::InvalidTransition { .. } | CropError::InvalidDisplaySize { .. }) => {
                "That action is not available right now".into()
            }
            Self::Package(_) => "Could not prepare the cropped file".into(),
            Self::Store(_) => "Upload failed, please try again".into(),
            Self::Config(_) => "Configuration is invalid".into(),
            Self::DuplicateOutput { file_name, .. } => {
                format!("Another file in this batch is also saved as {file_name}")
            }
            Self::Task(_) => "Something went wrong, please try again".into(),
        }
    }
}

// ============================================================================
// Currency
// ============================================================================

/// Generation counter for acquisitions.
///
/// Only the id returned by the latest [`begin`](Self::begin) is current, and
/// after [`invalidate`](Self::invalidate) none is.
#[derive(Debug, Default)]
pub struct AcquisitionTracker {
    generation: AtomicU64,
}

impl AcquisitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> AcquisitionId {
        AcquisitionId(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, id: AcquisitionId) -> bool {
        self.generation.load(Ordering::SeqCst) == id.0
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Receives the session's terminal events.
///
/// Called with the session lock held: implementations must not call back
/// into the pipeline.
pub trait CropSink: Send + Sync {
    fn on_crop_complete(&self, file: OutputFile);
    fn on_cancel(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum CropOutcome {
    Completed(OutputFile),
    Cancelled,
}

/// Forwards outcomes into a channel. A dropped receiver is ignored.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<CropOutcome>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::Receiver<CropOutcome>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl CropSink for ChannelSink {
    fn on_crop_complete(&self, file: OutputFile) {
        if self.tx.send(CropOutcome::Completed(file)).is_err() {
            debug!("Crop outcome receiver is gone");
        }
    }

    fn on_cancel(&self) {
        if self.tx.send(CropOutcome::Cancelled).is_err() {
            debug!("Crop outcome receiver is gone");
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug)]
struct Session {
    engine: CropEngine,
    source: Option<RawImageSource>,
    summary: Option<PreviewSummary>,
}

pub struct CropPipeline<B> {
    backend: Arc<B>,
    config: Arc<PipelineConfig>,
    tracker: AcquisitionTracker,
    session: Mutex<Session>,
    sink: Arc<dyn CropSink>,
}

impl<B: ImageBackend + Send + 'static> CropPipeline<B> {
    pub fn new(backend: B, config: PipelineConfig, sink: Arc<dyn CropSink>) -> Self {
        let policy = CropPolicy::from_config(&config);
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            tracker: AcquisitionTracker::new(),
            session: Mutex::new(Session {
                engine: CropEngine::new(policy),
                source: None,
                summary: None,
            }),
            sink,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept the first candidate and load it for cropping.
    ///
    /// Returns `Ok(None)` if a later selection or a cancel superseded this
    /// one while it was decoding. A rejected batch leaves the session as it
    /// was.
    pub async fn select(
        &self,
        candidates: Vec<CandidateFile>,
    ) -> Result<Option<Preview>, PipelineError> {
        let source = acquire(candidates, &self.config.acquisition)?;

        let id = {
            let mut session = self.lock();
            let id = self.tracker.begin();
            session.engine.dispatch(CropEvent::SourceAccepted(id))?;
            session.source = Some(source.clone());
            session.summary = None;
            id
        };

        let backend = Arc::clone(&self.backend);
        let config = Arc::clone(&self.config);
        let decoded =
            run_blocking(move || render_preview(backend.as_ref(), &source, &config)).await;

        let mut session = self.lock();
        if !self.tracker.is_current(id) {
            debug!("Dropping preview for superseded acquisition {id}");
            return Ok(None);
        }
        match decoded {
            Ok(preview) => {
                session.engine.dispatch(CropEvent::ImageDecoded {
                    id,
                    displayed: preview.displayed,
                    region: preview.initial_region,
                })?;
                session.summary = Some(preview.summary.clone());
                Ok(Some(preview))
            }
            Err(e) => {
                session.engine.dispatch(CropEvent::DecodeFailed(id))?;
                session.source = None;
                Err(e)
            }
        }
    }

    fn apply(&self, event: CropEvent) -> Result<(), PipelineError> {
        self.lock().engine.dispatch(event)?;
        Ok(())
    }

    pub fn drag_start(&self, handle: Handle) -> Result<(), PipelineError> {
        self.apply(CropEvent::DragStarted(handle))
    }

    pub fn drag_move(&self, dx: f64, dy: f64) -> Result<(), PipelineError> {
        self.apply(CropEvent::DragMoved { dx, dy })
    }

    pub fn drag_end(&self) -> Result<(), PipelineError> {
        self.apply(CropEvent::DragReleased)
    }

    pub fn resize_display(&self, width: f64, height: f64) -> Result<(), PipelineError> {
        self.apply(CropEvent::DisplayResized { width, height })
    }

    pub fn set_region(&self, region: Rect) -> Result<(), PipelineError> {
        self.apply(CropEvent::SetRegion(region))
    }

    pub fn state(&self) -> CropState {
        *self.lock().engine.state()
    }

    pub fn region(&self) -> Option<Rect> {
        self.lock().engine.region()
    }

    pub fn completed_crop(&self) -> Option<CompletedCrop> {
        self.lock().engine.completed_crop()
    }

    /// Media type of the accepted source.
    pub fn media_type(&self) -> Option<MediaType> {
        self.lock().source.as_ref().map(|s| s.media_type)
    }

    pub fn summary(&self) -> Option<PreviewSummary> {
        self.lock().summary.clone()
    }

    pub fn quality_feedback(&self) -> Result<QualityFeedback, PipelineError> {
        Ok(self.lock().engine.quality_feedback()?)
    }

    /// Confirm the completed crop, encode it and hand it to the sink.
    ///
    /// Returns `Ok(None)` when the session was cancelled or superseded while
    /// encoding. On an encode failure the session goes back to `CropReady`.
    pub async fn confirm(&self) -> Result<Option<OutputFile>, PipelineError> {
        let (id, params, file_name) = {
            let mut guard = self.lock();
            let session = &mut *guard;
            session.engine.dispatch(CropEvent::Confirm)?;
            let (Some(ws), Some(source)) =
                (session.engine.confirmed().copied(), session.source.as_ref())
            else {
                return Err(CropError::NoImage.into());
            };
            let params = plan_composite(source, &ws.displayed, &ws.completed, &self.config.crop);
            (ws.id, params, source.file_name.clone())
        };

        let backend = Arc::clone(&self.backend);
        let encoded = run_blocking(move || composite(backend.as_ref(), &params)).await;

        let mut session = self.lock();
        if !self.tracker.is_current(id) || session.engine.confirmed().is_none() {
            debug!("Dropping crop for superseded acquisition {id}");
            return Ok(None);
        }
        let raster = match encoded {
            Ok(raster) => raster,
            Err(e) => {
                session.engine.dispatch(CropEvent::EncodeFailed)?;
                return Err(e);
            }
        };

        let file = package_raster(&raster, &file_name, &self.config.crop.suffix, Utc::now())?;
        info!(
            "Crop complete: {} ({}x{}, {})",
            file.file_name(),
            raster.width,
            raster.height,
            file.formatted_size()
        );
        self.sink.on_crop_complete(file.clone());
        Ok(Some(file))
    }

    /// Abandon the session. Any in-flight decode or encode becomes stale.
    pub fn cancel(&self) -> Result<(), PipelineError> {
        let mut session = self.lock();
        self.tracker.invalidate();
        session.engine.dispatch(CropEvent::Cancel)?;
        session.source = None;
        session.summary = None;
        info!("Crop cancelled");
        self.sink.on_cancel();
        Ok(())
    }
}

/// Run blocking image work off the async runtime.
async fn run_blocking<T, E, F>(work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<PipelineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(Into::into),
        Err(join) => Err(PipelineError::Task(join.to_string())),
    }
}
