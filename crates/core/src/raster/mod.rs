//! Raster data structures and operations

mod bands;
mod element;
mod geometry;
mod geotransform;
mod grid;
mod window;

pub use bands::{BandStack, ChangeBand};
pub use element::{RasterElement, SampleKind};
pub use geometry::RasterGeometry;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use window::PixelWindow;
