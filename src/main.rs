use chrono::Utc;
use clap::{Parser, Subcommand};
use dressupmate::acquire::read_candidate;
use dressupmate::batch::{self, CompressEvent};
use dressupmate::compress::{CompressOptions, compress_image};
use dressupmate::config::{self, PipelineConfig};
use dressupmate::crop::Handle;
use dressupmate::imaging::{Rect, RustBackend};
use dressupmate::output::{self, CropReport, InspectReport};
use dressupmate::package::{OutputFile, package_compressed};
use dressupmate::pipeline::{ChannelSink, CropOutcome, CropPipeline, PipelineError};
use dressupmate::store::{self, LocalObjectStore};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dressupmate")]
#[command(about = "Crop and compress garment photos for a wardrobe catalog")]
#[command(long_about = "\
Crop and compress garment photos for a wardrobe catalog

Photos are cropped to a locked 2:3 portrait region and re-encoded as JPEG.
Accepted inputs: .jpg, .jpeg, .png, .webp up to 10 MB (configurable).

Crop flow:

  inspect  →  how the photo would be shown and where the crop starts
  crop     →  adjust the region, confirm, write <name>_cropped.jpg
  compress →  shrink finished photos to a bounded width

Configuration is read from ./dressupmate.toml when present, or from the
file given with --config. Run 'dressupmate gen-config' to print a
documented default config.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./dressupmate.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a photo would be previewed and cropped
    Inspect {
        file: PathBuf,
    },
    /// Crop a photo to the configured aspect ratio
    Crop {
        file: PathBuf,

        /// Crop region in display pixels: x,y,width,height
        #[arg(long, value_parser = parse_region)]
        region: Option<Rect>,

        /// Drag a handle by a display-pixel delta, e.g. top-left:-20,-30.
        /// Repeatable; applied in order after --region.
        #[arg(long = "drag", value_parser = parse_drag)]
        drags: Vec<Drag>,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Also run the compression stage on the cropped file
        #[arg(long)]
        compress: bool,

        /// Store the result in this directory under a timestamped key
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Re-encode photos at a bounded width
    Compress {
        /// Files or directories (walked recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Maximum output width in pixels
        #[arg(long)]
        max_width: Option<u32>,

        /// JPEG quality, 0 < q <= 1
        #[arg(long)]
        quality: Option<f64>,

        /// Output directory
        #[arg(long, default_value = "compressed")]
        out: PathBuf,

        /// Store results in this directory under timestamped keys
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Print a stock dressupmate.toml with all options documented
    GenConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    handle: Handle,
    dx: f64,
    dy: f64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let mut config = config::load_config(cli.config.as_deref(), &cwd)?;

    let result = match cli.command {
        Command::Inspect { file } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(inspect(&file, config, cli.json))
        }
        Command::Crop {
            file,
            region,
            drags,
            out,
            compress,
            store,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let session = CropSession {
                region,
                drags,
                out,
                compress,
                store,
            };
            runtime.block_on(crop(&file, config, session, cli.json))
        }
        Command::Compress {
            paths,
            max_width,
            quality,
            out,
            store,
        } => {
            if let Some(max_width) = max_width {
                config.compression.max_width = max_width;
            }
            if let Some(quality) = quality {
                config.compression.quality = quality;
            }
            config.validate()?;
            compress(&paths, &config, &out, store.as_deref(), cli.json)
        }
        Command::GenConfig => Ok(()),
    };

    match result {
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(rejection) => {
                output::print_rejection(rejection);
                std::process::exit(1);
            }
            None => Err(e),
        },
        Ok(()) => Ok(()),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

async fn inspect(file: &Path, config: PipelineConfig, json: bool) -> Result<(), Box<dyn Error>> {
    let candidate = read_candidate(file, &config.acquisition)
        .await
        .map_err(PipelineError::from)?;
    let (sink, _outcomes) = ChannelSink::channel();
    let backend = RustBackend::with_limits(config.surface.limits());
    let pipeline = CropPipeline::new(backend, config, Arc::new(sink));

    let file_name = candidate.file_name.clone();
    let byte_len = candidate.bytes.len() as u64;
    let Some(preview) = pipeline.select(vec![candidate]).await? else {
        return Err("selection was superseded".into());
    };
    let media_type = pipeline.media_type().ok_or("no image is loaded")?;
    let report = InspectReport {
        file_name,
        media_type,
        byte_len,
        preview,
        quality: pipeline.quality_feedback()?,
    };

    if json {
        print_json(&report)
    } else {
        output::print_inspect(&report);
        Ok(())
    }
}

// ============================================================================
// crop
// ============================================================================

struct CropSession {
    region: Option<Rect>,
    drags: Vec<Drag>,
    out: PathBuf,
    compress: bool,
    store: Option<PathBuf>,
}

async fn crop(
    file: &Path,
    config: PipelineConfig,
    session: CropSession,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let candidate = read_candidate(file, &config.acquisition)
        .await
        .map_err(PipelineError::from)?;
    let compress_options = CompressOptions::from_config(&config.compression);
    let backend = RustBackend::with_limits(config.surface.limits());
    let (sink, outcomes) = ChannelSink::channel();
    let pipeline = CropPipeline::new(backend.clone(), config, Arc::new(sink));

    pipeline.select(vec![candidate]).await?;
    if let Some(region) = session.region {
        pipeline.set_region(region)?;
    }
    for drag in &session.drags {
        pipeline.drag_start(drag.handle)?;
        pipeline.drag_move(drag.dx, drag.dy)?;
        pipeline.drag_end()?;
    }
    for line in output::format_quality(&pipeline.quality_feedback()?, 0) {
        log::info!("{}", line.trim_start());
    }

    if pipeline.confirm().await?.is_none() {
        return Err("crop was cancelled".into());
    }
    let Ok(CropOutcome::Completed(mut file)) = outcomes.try_recv() else {
        return Err("crop did not complete".into());
    };

    let mut dimensions = pipeline
        .quality_feedback()
        .map(|q| (q.natural_width, q.natural_height))
        .unwrap_or_default();
    if session.compress {
        let (compressed, dims) =
            tokio::task::spawn_blocking(move || compress_output(&backend, &file, &compress_options))
                .await??;
        file = compressed;
        dimensions = dims;
    }

    let mut report = CropReport::new(file, dimensions);
    report.written = Some(report.file.write_into(&session.out)?);
    if let Some(dir) = &session.store {
        let bucket = LocalObjectStore::file_urls(dir);
        let stored =
            store::upload(&bucket, &report.file, Utc::now()).map_err(PipelineError::from)?;
        report.stored = Some(stored);
    }

    if json {
        print_json(&report)
    } else {
        output::print_crop_report(&report);
        Ok(())
    }
}

/// Run a finished crop through the compression stage.
fn compress_output(
    backend: &RustBackend,
    file: &OutputFile,
    options: &CompressOptions,
) -> Result<(OutputFile, (u32, u32)), PipelineError> {
    let compressed = compress_image(backend, file.bytes().clone(), file.media_type(), options)?;
    let dims = (compressed.width, compressed.height);
    Ok((
        package_compressed(&compressed, file.file_name(), file.last_modified())?,
        dims,
    ))
}

// ============================================================================
// compress
// ============================================================================

fn compress(
    paths: &[PathBuf],
    config: &PipelineConfig,
    out: &Path,
    store_dir: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    init_thread_pool(&config.processing);
    let inputs = batch::collect_inputs(paths, &config.acquisition.allowed_types);
    let options = CompressOptions::from_config(&config.compression);
    let backend = RustBackend::with_limits(config.surface.limits());

    let (tx, rx) = std::sync::mpsc::channel::<CompressEvent>();
    let printer = std::thread::spawn(move || {
        let mut events = Vec::new();
        for event in rx {
            if json {
                events.push(event);
            } else {
                for line in output::format_compress_event(&event) {
                    println!("{}", line);
                }
            }
        }
        events
    });
    let outcomes = batch::compress_files(
        &backend,
        &inputs,
        &config.acquisition,
        &options,
        Utc::now(),
        Some(tx),
    );
    let events = printer.join().map_err(|_| "progress printer panicked")?;

    let bucket = store_dir.map(LocalObjectStore::file_urls);
    let mut compressed = 0;
    let mut failed = 0;
    for outcome in &outcomes {
        let Ok(file) = &outcome.result else {
            failed += 1;
            continue;
        };
        file.write_into(out)?;
        if let Some(bucket) = &bucket {
            store::upload(bucket, file, Utc::now()).map_err(PipelineError::from)?;
        }
        compressed += 1;
    }

    if json {
        print_json(&events)?;
    } else {
        output::print_compress_summary(compressed, failed);
    }
    if failed > 0 {
        return Err(format!("{failed} of {} files failed", outcomes.len()).into());
    }
    Ok(())
}

// ============================================================================
// Argument parsing
// ============================================================================

fn parse_numbers<const N: usize>(text: &str) -> Result<[f64; N], String> {
    let values: Vec<f64> = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<_, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {N} comma-separated numbers, got {}", v.len()))
}

fn parse_region(text: &str) -> Result<Rect, String> {
    let [x, y, width, height] = parse_numbers::<4>(text)?;
    Ok(Rect::new(x, y, width, height))
}

fn parse_drag(text: &str) -> Result<Drag, String> {
    let (handle, delta) = text
        .split_once(':')
        .ok_or_else(|| format!("expected HANDLE:DX,DY, got '{text}'"))?;
    let handle = handle.parse::<Handle>()?;
    let [dx, dy] = parse_numbers::<2>(delta)?;
    Ok(Drag { handle, dx, dy })
}
