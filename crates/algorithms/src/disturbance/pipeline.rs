//! Per-file disturbance pipeline
//!
//! One call to [`DisturbancePipeline::process`] turns a CHMAP GeoTIFF into a
//! BIN label GeoTIFF: warp onto the working grid, align with the land-cover
//! raster, read the shared window, detect, write. The land-cover and
//! false-mask datasets are opened once in [`DisturbancePipeline::new`] and
//! shared by every call; CHMAP handles and scratch files are scoped to the
//! call.

use std::path::{Path, PathBuf};

use dectree_core::io::{
    read_change_stack, warp_to_grid, write_geotiff, GeoTiffOptions, RasterDataset,
    TiffCompression, WorkingGrid,
};
use dectree_core::raster::{BandStack, Raster, RasterGeometry};
use dectree_core::{Error, Result};
use tempfile::TempDir;
use tracing::{debug, info};

use super::params::DisturbanceParams;
use super::detect_disturbance;
use crate::alignment::align;

/// Result of processing one CHMAP file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// A new BIN file was written
    Written,
    /// The BIN file already existed; nothing was read or written
    AlreadyExists,
    /// The CHMAP does not overlap the land cover; nothing was written
    NoOverlap,
}

/// Inputs shared by every CHMAP of a run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Land-cover raster (0 = forest, 1 = rangeland, 2-6 excluded)
    pub landcover: PathBuf,
    /// False-positive mask (1 = known false-change site)
    pub false_mask: PathBuf,
    /// Grid CHMAPs are warped onto first; `None` uses them as they are
    pub working_grid: Option<WorkingGrid>,
    pub params: DisturbanceParams,
    pub compression: TiffCompression,
}

impl PipelineConfig {
    pub fn new(landcover: impl Into<PathBuf>, false_mask: impl Into<PathBuf>) -> Self {
        Self {
            landcover: landcover.into(),
            false_mask: false_mask.into(),
            working_grid: Some(WorkingGrid::default()),
            params: DisturbanceParams::default(),
            compression: TiffCompression::Lzw,
        }
    }
}

/// Output path of a CHMAP: `CHMAP` replaced by `BIN` in the file name,
/// placed in `<output_dir>/<tile>/`.
///
/// `None` when the file name does not mention `CHMAP`.
pub fn bin_path_for(chmap: &Path, output_dir: &Path, tile: &str) -> Option<PathBuf> {
    let name = chmap.file_name()?.to_str()?;
    if !name.contains("CHMAP") {
        return None;
    }
    Some(output_dir.join(tile).join(name.replace("CHMAP", "BIN")))
}

/// Processes CHMAP files against one land-cover / false-mask pair.
///
/// Shared by reference across worker threads; windowed reads on the
/// land-cover and false-mask datasets are independent of each other.
#[derive(Debug)]
pub struct DisturbancePipeline {
    config: PipelineConfig,
    landcover: RasterDataset,
    landcover_geometry: RasterGeometry,
    false_mask: RasterDataset,
    false_mask_geometry: RasterGeometry,
}

impl DisturbancePipeline {
    /// Validate the parameters and open the land-cover and false-mask rasters.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.params.validate()?;

        let landcover = RasterDataset::open(&config.landcover)?;
        let landcover_geometry = landcover.geometry()?;
        let false_mask = RasterDataset::open(&config.false_mask)?;
        let false_mask_geometry = false_mask.geometry()?;
        debug!(
            "land cover {} ({}x{}), false mask {} ({}x{})",
            config.landcover.display(),
            landcover_geometry.cols(),
            landcover_geometry.rows(),
            config.false_mask.display(),
            false_mask_geometry.cols(),
            false_mask_geometry.rows()
        );

        Ok(Self {
            config,
            landcover,
            landcover_geometry,
            false_mask,
            false_mask_geometry,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce `bin_path` from `chmap_path`.
    ///
    /// An existing `bin_path` is left untouched. The output is written to a
    /// staging file and renamed, so a failure never leaves a partial file.
    pub fn process(&self, chmap_path: &Path, bin_path: &Path) -> Result<TileOutcome> {
        if bin_path.exists() {
            info!("{} already exists, skipping", bin_path.display());
            return Ok(TileOutcome::AlreadyExists);
        }

        let scratch = TempDir::new()?;
        let target_path = match &self.config.working_grid {
            Some(grid) => {
                let warped = scratch.path().join("chmap_warped.tif");
                warp_to_grid(chmap_path, &warped, grid)?;
                debug!(
                    "warped {} to EPSG:{} at {}",
                    chmap_path.display(),
                    grid.epsg,
                    grid.resolution
                );
                warped
            }
            None => chmap_path.to_path_buf(),
        };

        let target = RasterDataset::open(&target_path)?;

        let alignment = match align(&self.landcover_geometry, &target.geometry()?)? {
            Some(alignment) => alignment,
            None => {
                info!(
                    "{} does not overlap the land cover, skipping",
                    chmap_path.display()
                );
                return Ok(TileOutcome::NoOverlap);
            }
        };
        debug!(
            "land-cover window {:?}, change window {:?}",
            alignment.reference_window(),
            alignment.target_window()
        );

        let mask_window = alignment
            .window_for(&self.false_mask_geometry)
            .ok_or_else(|| Error::Algorithm("false mask does not cover the land cover".into()))?;

        let stack: BandStack<f64> = read_change_stack(&target, alignment.target_window())?;
        let lc: Raster<u8> = self
            .landcover
            .read_window(1, alignment.reference_window())?;
        let mask: Raster<u8> = self.false_mask.read_window(1, &mask_window)?;

        let mut labels = detect_disturbance(&stack, &lc, &mask, &self.config.params)?;
        labels.set_transform(*alignment.transform());
        labels.set_crs(
            target
                .crs()
                .or_else(|| self.config.working_grid.map(|grid| grid.crs())),
        );

        if let Some(parent) = bin_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_geotiff(
            &labels,
            bin_path,
            Some(GeoTiffOptions {
                compression: self.config.compression,
            }),
        )?;

        info!("wrote {}", bin_path.display());
        Ok(TileOutcome::Written)
    }
}
