//! Strong / weak evidence of change from CHMAP band thresholds

use ndarray::Array2;
use crate::maybe_rayon::*;
use dectree_core::raster::{BandStack, ChangeBand, Raster};
use dectree_core::{Error, Result};

use super::params::ThresholdParams;

/// Per-cell outcome of the two threshold rule sets over one window
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub strong: Array2<bool>,
    pub weak: Array2<bool>,
}

impl Evidence {
    /// Shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.weak.dim()
    }

    pub fn strong_count(&self) -> usize {
        self.strong.iter().filter(|&&v| v).count()
    }

    pub fn weak_count(&self) -> usize {
        self.weak.iter().filter(|&&v| v).count()
    }
}

/// Evaluate the strong and weak rule sets over a windowed CHMAP.
///
/// Cells whose statistic reaches `nodata_statistic`, or whose land cover is
/// an excluded class, are false in both grids. The land-cover window must
/// have the same shape as the bands.
pub fn classify_thresholds(
    stack: &BandStack<f64>,
    landcover: &Raster<u8>,
    params: &ThresholdParams,
) -> Result<Evidence> {
    let blue = stack.band(ChangeBand::Blue)?;
    let red = stack.band(ChangeBand::Red)?;
    let nir = stack.band(ChangeBand::Nir)?;
    let stat = stack.band(ChangeBand::ChiSquare)?;

    let (rows, cols) = blue.shape();
    if landcover.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: landcover.rows(),
            ac: landcover.cols(),
        });
    }

    let (blue, red, nir, stat) = (blue.data(), red.data(), nir.data(), stat.data());
    let lc = landcover.data();

    let (strong, weak): (Vec<bool>, Vec<bool>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cells = Vec::with_capacity(cols);
            for col in 0..cols {
                let idx = (row, col);
                let s = stat[idx];
                if s >= params.nodata_statistic || params.is_excluded(lc[idx]) {
                    cells.push((false, false));
                    continue;
                }
                let (b, r, n) = (blue[idx], red[idx], nir[idx]);
                cells.push((
                    params.strong.matches(b, r, n, s),
                    params.weak.matches(b, r, n, s),
                ));
            }
            cells
        })
        .unzip();

    let strong = Array2::from_shape_vec((rows, cols), strong)
        .map_err(|e| Error::Other(e.to_string()))?;
    let weak = Array2::from_shape_vec((rows, cols), weak)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(Evidence { strong, weak })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Zip;

    /// Stack of 5 constant bands; green is unused by the rules
    fn stack(rows: usize, cols: usize, blue: f64, red: f64, nir: f64, stat: f64) -> BandStack<f64> {
        let bands = [blue, 0.0, red, nir, stat]
            .iter()
            .map(|&v| Raster::filled(rows, cols, v))
            .collect();
        BandStack::new(bands).unwrap()
    }

    fn classify_cell(blue: f64, red: f64, nir: f64, stat: f64) -> (bool, bool) {
        let ev = classify_thresholds(
            &stack(1, 1, blue, red, nir, stat),
            &Raster::filled(1, 1, 0u8),
            &ThresholdParams::default(),
        )
        .unwrap();
        (ev.strong[(0, 0)], ev.weak[(0, 0)])
    }

    #[test]
    fn test_co_detected_cell() {
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 800.0), (true, true));
    }

    #[test]
    fn test_weak_only_cell() {
        assert_eq!(classify_cell(5.0, -2.0, -2.0, 1800.0), (false, true));
        assert_eq!(classify_cell(1.5, -0.5, -5.5, 120.0), (false, true));
    }

    #[test]
    fn test_strong_boundaries_are_open() {
        assert_eq!(classify_cell(2.0, -3.0, -3.0, 800.0), (false, true));
        assert_eq!(classify_cell(10.0, -3.0, -3.0, 800.0), (false, true));
        assert_eq!(classify_cell(6.0, -1.0, -3.0, 800.0), (false, true));
        assert_eq!(classify_cell(6.0, -3.0, -5.0, 800.0), (false, true));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 150.0), (false, true));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 1500.0), (false, true));
    }

    #[test]
    fn test_weak_boundaries_are_open() {
        assert_eq!(classify_cell(1.0, -3.0, -3.0, 800.0), (false, false));
        assert_eq!(classify_cell(11.0, -3.0, -3.0, 800.0), (false, false));
        assert_eq!(classify_cell(6.0, 0.0, -3.0, 800.0), (false, false));
        assert_eq!(classify_cell(6.0, -3.0, -6.0, 800.0), (false, false));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 100.0), (false, false));
    }

    #[test]
    fn test_statistic_nodata() {
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 1999.0), (false, true));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 2000.0), (false, false));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, 5000.0), (false, false));
    }

    #[test]
    fn test_nan_matches_nothing() {
        assert_eq!(classify_cell(f64::NAN, -3.0, -3.0, 800.0), (false, false));
        assert_eq!(classify_cell(6.0, -3.0, -3.0, f64::NAN), (false, false));
    }

    #[test]
    fn test_excluded_land_cover() {
        let bands = stack(1, 8, 6.0, -3.0, -3.0, 800.0);
        let lc = Raster::from_vec(vec![0, 1, 2, 3, 4, 5, 6, 7], 1, 8).unwrap();
        let ev = classify_thresholds(&bands, &lc, &ThresholdParams::default()).unwrap();

        let strong: Vec<bool> = ev.strong.iter().copied().collect();
        assert_eq!(strong, vec![true, true, false, false, false, false, false, true]);
        assert_eq!(ev.strong, ev.weak);
    }

    #[test]
    fn test_strong_implies_weak() {
        let blues = [0.0, 1.5, 2.5, 9.5, 10.5, 12.0];
        let reds = [-7.0, -5.5, -3.0, -0.5, 0.5];
        let stats = [50.0, 120.0, 160.0, 1400.0, 1600.0, 2500.0];

        let mut blue = Vec::new();
        let mut red = Vec::new();
        let mut stat = Vec::new();
        for &b in &blues {
            for &r in &reds {
                for &s in &stats {
                    blue.push(b);
                    red.push(r);
                    stat.push(s);
                }
            }
        }
        let n = blue.len();
        let band = |v: Vec<f64>| Raster::from_vec(v, 1, n).unwrap();
        let bands = BandStack::new(vec![
            band(blue),
            Raster::new(1, n),
            band(red.clone()),
            band(red),
            band(stat),
        ])
        .unwrap();

        let ev =
            classify_thresholds(&bands, &Raster::filled(1, n, 0u8), &ThresholdParams::default())
                .unwrap();
        assert!(ev.strong_count() > 0);
        assert!(ev.weak_count() > ev.strong_count());
        assert!(Zip::from(&ev.strong).and(&ev.weak).all(|&s, &w| !s || w));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let result = classify_thresholds(
            &stack(3, 3, 6.0, -3.0, -3.0, 800.0),
            &Raster::filled(3, 4, 0u8),
            &ThresholdParams::default(),
        );
        assert!(matches!(
            result,
            Err(Error::SizeMismatch { er: 3, ec: 3, ar: 3, ac: 4 })
        ));
    }
}
