//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `dressupmate.toml` files. Stock
//! defaults are overridden by a user config file, which in turn is
//! overridden by command-line flags.
//!
//! ## Config File Location
//!
//! The CLI reads `--config <FILE>` when given, otherwise `dressupmate.toml`
//! in the working directory if present. Without either, stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [acquisition]
//! max_bytes = 10485760                 # 10 MiB upload ceiling
//! allowed_types = ["image/jpeg", "image/png", "image/webp"]
//! sniff_content = true                 # Check magic bytes against the declared type
//!
//! [display]
//! max_width = 480.0                    # Viewport the preview is fitted into
//! max_height = 720.0
//!
//! [crop]
//! aspect_ratio = [2, 3]                # width:height, portrait garment frame
//! initial_fill = 0.8                   # 0.8-0.9 of the largest fitting region
//! min_display_side = 10.0              # Shortest region side on screen
//! min_output_side = 32                 # Shortest side of the cropped JPEG
//! quality = 0.95                       # JPEG quality factor (0-1]
//! suffix = "_cropped"                  # Appended to the original stem
//!
//! [compression]
//! max_width = 1200
//! quality = 0.7
//!
//! [quality_tiers]
//! very_low = [300, 450]                # Below this: "select a larger area"
//! low = [500, 750]
//!
//! [surface]
//! max_side = 16384
//! max_pixels = 268435456
//!
//! [processing]
//! max_processes = 4                    # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [crop]
//! initial_fill = 0.9
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{AspectRatio, MediaType, Quality, QualityThresholds, SurfaceLimits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in a directory when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "dressupmate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `dressupmate.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// What the acquisition stage accepts.
    pub acquisition: AcquisitionConfig,
    /// Preview viewport.
    pub display: DisplayConfig,
    /// Crop engine and crop output settings.
    pub crop: CropConfig,
    /// Bounded-width re-encode settings.
    pub compression: CompressionConfig,
    /// Advisory quality thresholds.
    pub quality_tiers: QualityTiersConfig,
    /// Off-screen buffer ceiling.
    pub surface: SurfaceConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let acq = &self.acquisition;
        if acq.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "acquisition.max_bytes must be positive".into(),
            ));
        }
        if acq.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "acquisition.allowed_types must not be empty".into(),
            ));
        }

        if !positive(self.display.max_width) || !positive(self.display.max_height) {
            return Err(ConfigError::Validation(
                "display.max_width and display.max_height must be positive".into(),
            ));
        }

        let crop = &self.crop;
        if crop.aspect_ratio[0] == 0 || crop.aspect_ratio[1] == 0 {
            return Err(ConfigError::Validation(
                "crop.aspect_ratio values must be non-zero".into(),
            ));
        }
        if !(0.8..=0.9).contains(&crop.initial_fill) {
            return Err(ConfigError::Validation(
                "crop.initial_fill must be between 0.8 and 0.9".into(),
            ));
        }
        if !positive(crop.min_display_side) {
            return Err(ConfigError::Validation(
                "crop.min_display_side must be positive".into(),
            ));
        }
        validate_quality("crop.quality", crop.quality)?;
        if crop.suffix.is_empty() || crop.suffix.contains(['/', '\\', '.']) {
            return Err(ConfigError::Validation(
                "crop.suffix must be non-empty and contain no '/', '\\' or '.'".into(),
            ));
        }

        if self.compression.max_width == 0 {
            return Err(ConfigError::Validation(
                "compression.max_width must be positive".into(),
            ));
        }
        validate_quality("compression.quality", self.compression.quality)?;

        let tiers = &self.quality_tiers;
        if tiers.very_low[0] > tiers.low[0] || tiers.very_low[1] > tiers.low[1] {
            return Err(ConfigError::Validation(
                "quality_tiers.very_low must not exceed quality_tiers.low".into(),
            ));
        }

        if self.surface.max_side == 0 || self.surface.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "surface limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn validate_quality(key: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{key} must be in (0, 1], got {value}"
        )))
    }
}

/// What the acquisition stage accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Largest accepted payload in bytes.
    pub max_bytes: u64,
    /// Media types accepted, as MIME strings.
    pub allowed_types: Vec<MediaType>,
    /// Reject payloads whose magic bytes contradict the declared type.
    pub sniff_content: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_types: MediaType::ALL.to_vec(),
            sniff_content: true,
        }
    }
}

/// Viewport the preview is fitted into, in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub max_width: f64,
    pub max_height: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_width: 480.0,
            max_height: 720.0,
        }
    }
}

/// Crop engine and crop output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Aspect ratio as `[width, height]`.
    pub aspect_ratio: [u32; 2],
    /// Fraction of the largest fitting region used for the initial crop.
    pub initial_fill: f64,
    /// Shortest side the region may be dragged down to, in display units.
    pub min_display_side: f64,
    /// Shortest side the cropped output may have, in natural pixels.
    pub min_output_side: u32,
    /// JPEG quality factor for crop output.
    pub quality: f64,
    /// Appended to the original file stem.
    pub suffix: String,
}

impl CropConfig {
    pub fn aspect(&self) -> AspectRatio {
        AspectRatio::new(self.aspect_ratio[0], self.aspect_ratio[1])
    }

    pub fn jpeg_quality(&self) -> Quality {
        Quality::from_fraction(self.quality)
    }
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: [2, 3],
            initial_fill: 0.8,
            min_display_side: 10.0,
            min_output_side: 32,
            quality: 0.95,
            suffix: "_cropped".to_string(),
        }
    }
}

/// Bounded-width re-encode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    pub max_width: u32,
    pub quality: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: 1200,
            quality: 0.7,
        }
    }
}

/// Advisory thresholds as `[width, height]` in natural pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityTiersConfig {
    pub very_low: [u32; 2],
    pub low: [u32; 2],
}

impl QualityTiersConfig {
    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            very_low: (self.very_low[0], self.very_low[1]),
            low: (self.low[0], self.low[1]),
        }
    }
}

impl Default for QualityTiersConfig {
    fn default() -> Self {
        let t = QualityThresholds::default();
        Self {
            very_low: [t.very_low.0, t.very_low.1],
            low: [t.low.0, t.low.1],
        }
    }
}

/// Off-screen buffer ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurfaceConfig {
    pub max_side: u32,
    pub max_pixels: u64,
}

impl SurfaceConfig {
    pub fn limits(&self) -> SurfaceLimits {
        SurfaceLimits {
            max_side: self.max_side,
            max_pixels: self.max_pixels,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        let limits = SurfaceLimits::default();
        Self {
            max_side: limits.max_side,
            max_pixels: limits.max_pixels,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; any other
/// value in the overlay replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `dressupmate.toml` from `dir` as a raw value, if it exists.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    read_raw_config(&config_path).map(Some)
}

/// Read an explicit config file. A missing file is an error.
pub fn read_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config: an explicit file when given, otherwise
/// `dressupmate.toml` in `dir` if present, over stock defaults.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = match explicit {
        Some(path) => Some(read_raw_config(path)?),
        None => load_raw_config(dir)?,
    };
    resolve_config(base, overlay)
}

/// The documented stock config, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# DressUpMate Pipeline Configuration
# ==================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass a file with --config, or place dressupmate.toml in the working
# directory. Command-line flags override values from the file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Source acquisition
# ---------------------------------------------------------------------------
[acquisition]
# Largest accepted file in bytes (10 MiB).
max_bytes = 10485760
# Accepted media types. Extensions .jpg, .jpeg, .png and .webp map onto these.
allowed_types = ["image/jpeg", "image/png", "image/webp"]
# Compare the file's magic bytes with its declared type and reject mismatches.
sniff_content = true

# ---------------------------------------------------------------------------
# Preview viewport
# ---------------------------------------------------------------------------
[display]
# The preview is scaled down (never up) to fit this box.
max_width = 480.0
max_height = 720.0

# ---------------------------------------------------------------------------
# Crop
# ---------------------------------------------------------------------------
[crop]
# Aspect ratio as [width, height]. [2, 3] is the portrait garment frame.
aspect_ratio = [2, 3]
# The initial region covers this fraction of the largest region that fits.
# Must be between 0.8 and 0.9.
initial_fill = 0.8
# The region's shorter side cannot be dragged below this (display units).
min_display_side = 10.0
# Confirm is refused when the cropped output's shorter side is below this.
min_output_side = 32
# JPEG quality factor for crop output, in (0, 1].
quality = 0.95
# Output name: original stem + suffix + ".jpg".
suffix = "_cropped"

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Wider images are scaled down to this width, keeping proportions.
max_width = 1200
# JPEG quality factor, in (0, 1].
quality = 0.7

# ---------------------------------------------------------------------------
# Quality feedback (advisory only)
# ---------------------------------------------------------------------------
[quality_tiers]
# Natural-resolution [width, height] below which a crop is flagged.
very_low = [300, 450]
low = [500, 750]

# ---------------------------------------------------------------------------
# Render surface
# ---------------------------------------------------------------------------
[surface]
# Largest off-screen buffer: per side, and in total pixels.
max_side = 16384
max_pixels = 268435456

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for batch compression. Omit for auto (= CPU cores).
# max_processes = 4
"##
}
