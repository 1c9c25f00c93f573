//! Raster footprints in geographic space

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelWindow};
use crate::vector::BoundingPolygon;

/// Affine transform plus grid size of a raster, without its data.
///
/// Only axis-aligned transforms are accepted: the footprint of a rotated
/// grid is not a rectangle and the window arithmetic below would be wrong.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGeometry {
    transform: GeoTransform,
    cols: usize,
    rows: usize,
}

impl RasterGeometry {
    pub fn new(transform: GeoTransform, cols: usize, rows: usize) -> Result<Self> {
        if !transform.is_axis_aligned() {
            return Err(Error::RotatedTransform(transform.to_gdal()));
        }
        if transform.pixel_width == 0.0 || transform.pixel_height == 0.0 {
            return Err(Error::InvalidParameter {
                name: "geotransform",
                value: format!("{:?}", transform.to_gdal()),
                reason: "pixel size must be non-zero".to_string(),
            });
        }
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            transform,
            cols,
            rows,
        })
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Closed rectangle through the four geographic corners of the grid.
    pub fn bounding_polygon(&self) -> BoundingPolygon {
        let gt = &self.transform;
        let x_a = gt.origin_x;
        let x_b = gt.origin_x + self.cols as f64 * gt.pixel_width;
        let y_a = gt.origin_y;
        let y_b = gt.origin_y + self.rows as f64 * gt.pixel_height;

        BoundingPolygon::from_bounds(x_a.min(x_b), y_a.min(y_b), x_a.max(x_b), y_a.max(y_b))
    }

    /// Fractional `(col, row)` of a geographic coordinate.
    ///
    /// Equivalent to the inverse affine transform; the transform is
    /// axis-aligned, so this divides directly instead of multiplying by
    /// reciprocals, keeping grid-aligned coordinates exact.
    pub fn to_pixel(&self, geo_x: f64, geo_y: f64) -> (f64, f64) {
        let gt = &self.transform;
        (
            (geo_x - gt.origin_x) / gt.pixel_width,
            (geo_y - gt.origin_y) / gt.pixel_height,
        )
    }

    /// Pixel window covering the envelope `(xmin, xmax, ymin, ymax)`.
    ///
    /// The upper-left corner `(xmin, ymax)` and lower-right corner
    /// `(xmax, ymin)` are converted with the inverse transform and truncated
    /// toward zero. `None` when the window would be empty.
    pub fn window_for(&self, xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Option<PixelWindow> {
        PixelWindow::from_pixel_bounds(self.to_pixel(xmin, ymax), self.to_pixel(xmax, ymin))
    }
}
