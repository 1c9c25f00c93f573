//! I/O operations for reading and writing GeoTIFF rasters
//!
//! Both backends expose the same surface: a read-only [`RasterDataset`]
//! handle with windowed band reads, atomic `write_geotiff*` functions and
//! `warp_to_grid` for moving a raster onto the [`WorkingGrid`].

mod chunks;
#[cfg(feature = "gdal")]
mod gdal_io;
mod native;
mod options;

#[cfg(feature = "gdal")]
pub use gdal_io::{warp_to_grid, write_geotiff, write_geotiff_bands, RasterDataset};

#[cfg(not(feature = "gdal"))]
pub use native::{warp_to_grid, write_geotiff, write_geotiff_bands, RasterDataset};

pub use options::{GeoTiffOptions, TiffCompression, WorkingGrid};

use crate::error::Result;
use crate::raster::{BandStack, ChangeBand, PixelWindow, RasterElement};

/// Read every band of a change raster over `window`.
pub fn read_change_stack<T>(dataset: &RasterDataset, window: &PixelWindow) -> Result<BandStack<T>>
where
    T: RasterElement + IoElement,
{
    let bands = ChangeBand::ALL
        .iter()
        .map(|band| dataset.read_window::<T>(band.band_number(), window))
        .collect::<Result<Vec<_>>>()?;
    BandStack::new(bands)
}

/// Element types the active backend can read and write.
#[cfg(feature = "gdal")]
pub trait IoElement: gdal::raster::GdalType {}
#[cfg(feature = "gdal")]
impl<T: gdal::raster::GdalType> IoElement for T {}

/// Element types the active backend can read and write.
#[cfg(not(feature = "gdal"))]
pub trait IoElement {}
#[cfg(not(feature = "gdal"))]
impl<T: RasterElement> IoElement for T {}
