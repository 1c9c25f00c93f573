//! DecTree CLI - forest and rangeland disturbance maps from CHMAP tiles

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use walkdir::WalkDir;

use dectree_algorithms::disturbance::{
    bin_path_for, DisturbancePipeline, PipelineConfig, TileOutcome,
};
use dectree_core::io::{RasterDataset, TiffCompression, WorkingGrid};
use dectree_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dectree")]
#[command(author, version, about = "Forest and rangeland disturbance mapping", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every CHMAP under INPUT/<tile>/ into OUTPUT/<tile>/
    Run {
        /// Directory holding one sub-directory per tile
        #[arg(short, long)]
        input: PathBuf,
        /// Output base directory
        #[arg(short, long)]
        output: PathBuf,
        /// Number of files processed in parallel
        #[arg(short, long, default_value = "1")]
        jobs: usize,
        #[command(flatten)]
        process: ProcessArgs,
    },
    /// Process a single CHMAP file
    Tile {
        /// CHMAP GeoTIFF
        chmap: PathBuf,
        /// Output base directory
        #[arg(short, long)]
        output: PathBuf,
        /// Tile name (defaults to the CHMAP's parent directory name)
        #[arg(long)]
        tile: Option<String>,
        #[command(flatten)]
        process: ProcessArgs,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Args)]
struct ProcessArgs {
    /// Land-cover raster (0 = forest, 1 = rangeland)
    #[arg(long)]
    landcover: PathBuf,
    /// False-positive mask raster (1 = suppress)
    #[arg(long)]
    false_mask: PathBuf,
    /// Chebyshev radius (pixels) around co-detected seeds
    #[arg(short, long, default_value = "5")]
    radius: usize,
    /// Use CHMAPs as they are instead of warping to EPSG:3857 at 10 m
    #[arg(long)]
    no_warp: bool,
    /// Output compression: NONE, LZW or DEFLATE
    #[arg(long, default_value = "LZW")]
    compression: String,
}

impl ProcessArgs {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::new(&self.landcover, &self.false_mask);
        config.params.expansion.radius = self.radius;
        config.working_grid = (!self.no_warp).then(WorkingGrid::default);
        config.compression = TiffCompression::parse(&self.compression)?;
        Ok(config)
    }

    /// Opens the land cover and false mask once for the whole run
    fn pipeline(&self) -> Result<DisturbancePipeline> {
        DisturbancePipeline::new(self.config()?).with_context(|| {
            format!(
                "Failed to set up pipeline with {} and {}",
                self.landcover.display(),
                self.false_mask.display()
            )
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb
}

/// One CHMAP and the BIN it produces
#[derive(Debug, Clone, PartialEq)]
struct Job {
    chmap: PathBuf,
    bin: PathBuf,
}

fn is_chmap(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("CHMAP"));
    let tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
    named && tiff
}

/// Every CHMAP at `input/<tile>/<file>`, in file-name order
fn discover_jobs(input: &Path, output: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    for entry in WalkDir::new(input)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_chmap(path) {
            continue;
        }
        let tile = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some(bin) = bin_path_for(path, output, tile) {
            jobs.push(Job {
                chmap: path.to_path_buf(),
                bin,
            });
        }
    }
    Ok(jobs)
}

#[derive(Debug, Default, PartialEq)]
struct Summary {
    written: usize,
    skipped: usize,
    no_overlap: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, outcome: &dectree_core::Result<TileOutcome>) {
        match outcome {
            Ok(TileOutcome::Written) => self.written += 1,
            Ok(TileOutcome::AlreadyExists) => self.skipped += 1,
            Ok(TileOutcome::NoOverlap) => self.no_overlap += 1,
            Err(_) => self.failed += 1,
        }
    }
}

fn run_jobs(pipeline: &DisturbancePipeline, jobs: &[Job], threads: usize) -> Result<Summary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("Failed to build worker pool")?;
    let pb = progress_bar(jobs.len());

    let outcomes: Vec<_> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let outcome = pipeline.process(&job.chmap, &job.bin);
                if let Err(e) = &outcome {
                    error!("{}: {}", job.chmap.display(), e);
                }
                pb.inc(1);
                outcome
            })
            .collect()
    });
    pb.finish_and_clear();

    let mut summary = Summary::default();
    outcomes.iter().for_each(|o| summary.record(o));
    Ok(summary)
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            input,
            output,
            jobs,
            process,
        } => {
            let pipeline = process.pipeline()?;
            let work = discover_jobs(&input, &output)?;
            info!("Found {} CHMAP files under {}", work.len(), input.display());

            let start = Instant::now();
            let summary = run_jobs(&pipeline, &work, jobs)?;
            info!(
                "Done in {:.2?}: {} written, {} already present, {} without overlap, {} failed",
                start.elapsed(),
                summary.written,
                summary.skipped,
                summary.no_overlap,
                summary.failed
            );
            if summary.failed > 0 {
                bail!("{} of {} files failed", summary.failed, work.len());
            }
        }

        Commands::Tile {
            chmap,
            output,
            tile,
            process,
        } => {
            let tile = tile
                .or_else(|| {
                    chmap
                        .parent()
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().into_owned())
                })
                .unwrap_or_default();
            let bin = bin_path_for(&chmap, &output, &tile)
                .with_context(|| format!("{} is not a CHMAP file name", chmap.display()))?;
            let pipeline = process.pipeline()?;

            let pb = spinner("Detecting disturbance...");
            let start = Instant::now();
            let outcome = pipeline
                .process(&chmap, &bin)
                .with_context(|| format!("Failed to process {}", chmap.display()))?;
            pb.finish_and_clear();

            match outcome {
                TileOutcome::Written => {
                    info!("Disturbance map saved to: {} ({:.2?})", bin.display(), start.elapsed())
                }
                TileOutcome::AlreadyExists => info!("{} already exists", bin.display()),
                TileOutcome::NoOverlap => info!("No overlap with the land cover, nothing written"),
            }
        }

        Commands::Info { input } => {
            let dataset = RasterDataset::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let (cols, rows) = dataset.size();
            let gt = dataset.geo_transform();
            let bounds = gt.bounds(cols, rows);

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} bands)", cols, rows, dataset.band_count());
            println!("Pixel size: {} x {}", gt.pixel_width, gt.pixel_height);
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = dataset.crs() {
                println!("CRS: {}", crs);
            }

            for band in 1..=dataset.band_count() {
                let raster: Raster<f64> = dataset.read_band(band)?;
                let stats = raster.statistics();
                println!("\nBand {}:", band);
                if let Some(nodata) = dataset.nodata(band) {
                    println!("  NoData: {}", nodata);
                }
                if let Some(min) = stats.min {
                    println!("  Min: {:.4}", min);
                }
                if let Some(max) = stats.max {
                    println!("  Max: {:.4}", max);
                }
                if let Some(mean) = stats.mean {
                    println!("  Mean: {:.4}", mean);
                }
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
                );
            }
        }
    }

    Ok(())
}
