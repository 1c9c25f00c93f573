//! # DecTree Core
//!
//! Core types and I/O for the DecTree disturbance mapper.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced single-band grid, and `BandStack<T>` for
//!   multi-band change rasters with named band access
//! - `GeoTransform`, `RasterGeometry`, `PixelWindow`: georeferencing and
//!   the footprint/window arithmetic used to align two rasters
//! - `BoundingPolygon`: raster footprints as planar polygons
//! - `CRS`: coordinate reference system identifiers
//! - GeoTIFF I/O, either native (`tiff` crate) or through GDAL

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{
    BandStack, ChangeBand, GeoTransform, PixelWindow, Raster, RasterElement, RasterGeometry,
};
pub use vector::BoundingPolygon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{
        BandStack, ChangeBand, GeoTransform, PixelWindow, Raster, RasterElement, RasterGeometry,
    };
    pub use crate::vector::BoundingPolygon;
    pub use crate::Algorithm;
}

/// Core trait for the processing steps in DecTree.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
