//! Pixel windows into a raster grid

use crate::error::{Error, Result};

/// Integer sub-rectangle of a raster grid.
///
/// Offsets are signed because a window derived from geographic bounds can
/// start left of or above the grid; [`PixelWindow::check_within`] rejects
/// such windows before any read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: isize,
    pub row_off: isize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn new(col_off: isize, row_off: isize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    /// Window covering a full `cols x rows` grid
    pub fn full(cols: usize, rows: usize) -> Self {
        Self::new(0, 0, cols, rows)
    }

    /// Build a window from fractional upper-left and lower-right pixel
    /// coordinates, truncating toward zero.
    ///
    /// Returns `None` when the resulting size is not positive.
    pub fn from_pixel_bounds(ul: (f64, f64), lr: (f64, f64)) -> Option<Self> {
        let (ul_col, ul_row) = ul;
        let (lr_col, lr_row) = lr;
        if !(ul_col.is_finite() && ul_row.is_finite() && lr_col.is_finite() && lr_row.is_finite()) {
            return None;
        }

        let cols = (lr_col - ul_col).trunc();
        let rows = (lr_row - ul_row).trunc();
        if cols < 1.0 || rows < 1.0 {
            return None;
        }

        Some(Self::new(
            ul_col.trunc() as isize,
            ul_row.trunc() as isize,
            cols as usize,
            rows as usize,
        ))
    }

    /// Window shape as (rows, cols), matching `Raster::shape`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    /// Ensure the window lies inside a `cols x rows` grid
    pub fn check_within(&self, cols: usize, rows: usize) -> Result<()> {
        let inside = self.col_off >= 0
            && self.row_off >= 0
            && self.col_off as usize + self.cols <= cols
            && self.row_off as usize + self.rows <= rows;

        if inside && !self.is_empty() {
            Ok(())
        } else {
            Err(Error::WindowOutOfBounds {
                col_off: self.col_off,
                row_off: self.row_off,
                win_cols: self.cols,
                win_rows: self.rows,
                cols,
                rows,
            })
        }
    }
}
