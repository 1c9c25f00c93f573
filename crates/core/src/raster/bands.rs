//! Multi-band rasters with named band access

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};

/// Band layout of a CHMAP change raster.
///
/// Each band holds one change measure between the two acquisition dates;
/// the chi-square band is the MAD test statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeBand {
    Blue,
    Green,
    Red,
    Nir,
    ChiSquare,
}

impl ChangeBand {
    pub const ALL: [ChangeBand; 5] = [
        ChangeBand::Blue,
        ChangeBand::Green,
        ChangeBand::Red,
        ChangeBand::Nir,
        ChangeBand::ChiSquare,
    ];

    /// 1-based band number in the CHMAP file
    pub fn band_number(self) -> usize {
        match self {
            ChangeBand::Blue => 1,
            ChangeBand::Green => 2,
            ChangeBand::Red => 3,
            ChangeBand::Nir => 4,
            ChangeBand::ChiSquare => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChangeBand::Blue => "blue",
            ChangeBand::Green => "green",
            ChangeBand::Red => "red",
            ChangeBand::Nir => "nir",
            ChangeBand::ChiSquare => "chi-square",
        }
    }
}

/// Same-shaped bands of one raster file, in file order.
#[derive(Debug, Clone)]
pub struct BandStack<T: RasterElement> {
    bands: Vec<Raster<T>>,
}

impl<T: RasterElement> BandStack<T> {
    /// Build a stack, rejecting bands whose shape differs from the first one
    pub fn new(bands: Vec<Raster<T>>) -> Result<Self> {
        if let Some(first) = bands.first() {
            let (er, ec) = first.shape();
            if let Some(bad) = bands.iter().find(|b| b.shape() != (er, ec)) {
                let (ar, ac) = bad.shape();
                return Err(Error::SizeMismatch { er, ec, ar, ac });
            }
        }
        Ok(Self { bands })
    }

    /// Band by 1-based number
    pub fn get(&self, band_number: usize) -> Result<&Raster<T>> {
        band_number
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or(Error::MissingBand {
                band: band_number,
                count: self.bands.len(),
            })
    }

    /// Band by its role in a change raster
    pub fn band(&self, band: ChangeBand) -> Result<&Raster<T>> {
        self.get(band.band_number())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Shape shared by all bands as (rows, cols)
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.first().map(Raster::shape)
    }
}
