//! # DressUpMate
//!
//! The image pipeline of a wardrobe catalog: the path a garment photo takes
//! from "someone picks a file" to "a named JPEG ready for upload".
//!
//! # Architecture: One Session, Six Stages
//!
//! ```text
//! 1. Acquire     picker/drop/disk  →  RawImageSource   (type + size checks)
//! 2. Preview     RawImageSource    →  DisplayedImage   (decode, fit, initial crop)
//! 3. Crop        events            →  CompletedCrop    (aspect-locked state machine)
//! 4. Composite   CompletedCrop     →  CroppedRaster    (natural-resolution JPEG)
//! 5. Compress    any image         →  bounded-width JPEG (optional)
//! 6. Package     bytes             →  OutputFile       (name, type, timestamp)
//! ```
//!
//! [`pipeline::CropPipeline`] strings stages 1 to 4 and 6 together as one
//! async session. Decode and encode run on tokio's blocking pool; every
//! selection gets an acquisition id, and results for a superseded id are
//! dropped. Batch compression ([`batch`]) runs stage 5 across many files on
//! a rayon pool.
//!
//! All pixel work goes through the [`imaging::ImageBackend`] trait, so the
//! stages can be tested against a recording mock without encoding images.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`acquire`] | Stage 1: first-wins batch handling, media type and size validation, disk reads |
//! | [`preview`] | Stage 2: viewport fit, initial crop region, preview summary |
//! | [`crop`] | Stage 3: crop state machine, handle drags, quality feedback |
//! | [`compositor`] | Stage 4: display-to-natural mapping and the cropped raster |
//! | [`compress`] | Stage 5: bounded-width re-encode |
//! | [`package`] | Stage 6: `OutputFile` with name, media type, timestamp and digest |
//! | [`pipeline`] | Async crop session, staleness tracking, cancellation, callbacks |
//! | [`batch`] | Parallel compression of files and directories |
//! | [`store`] | Object storage contract and a local-directory store |
//! | [`config`] | `dressupmate.toml` loading, merging with stock defaults, validation |
//! | [`naming`] | Output file names, storage keys, display names |
//! | [`imaging`] | Geometry, media types, backend trait, `image`-crate backend |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit State Machine
//!
//! The crop session is a closed set of states and events with a single
//! [`crop::CropEngine::dispatch`] entry point. Invalid events are errors
//! that leave the state untouched, so a stray drag or double confirm can
//! never corrupt the region.
//!
//! ## Display Coordinates In, Natural Pixels Out
//!
//! The crop region lives in display coordinates, because that is where
//! drags happen. It is mapped to natural pixels only when compositing,
//! using scale factors derived from the current display size. A viewport
//! resize rescales the region and the mapping together, so the natural
//! crop does not drift.
//!
//! ## Pure-Rust Imaging
//!
//! Decode, crop, resample (Lanczos3) and JPEG encode all use the `image`
//! crate. No system libraries, no external processes.

pub mod acquire;
pub mod batch;
pub mod compositor;
pub mod compress;
pub mod config;
pub mod crop;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod preview;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
