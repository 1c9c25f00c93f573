//! Final disturbance labels

use ndarray::{Array2, Zip};
use dectree_core::raster::Raster;
use dectree_core::{Error, Result};

use super::params::{LabelParams, FOREST_LOSS, LABEL_NODATA, RANGELAND_LOSS};

/// Label confirmed change by land cover.
///
/// Confirmed forest cells become [`FOREST_LOSS`], confirmed rangeland cells
/// [`RANGELAND_LOSS`]; every other cell is [`LABEL_NODATA`]. The output takes
/// the land-cover georeferencing and has no-data 255.
pub fn assign_labels(
    confirmed: &Array2<bool>,
    landcover: &Raster<u8>,
    params: &LabelParams,
) -> Result<Raster<u8>> {
    if confirmed.dim() != landcover.shape() {
        let (er, ec) = landcover.shape();
        let (ar, ac) = confirmed.dim();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let labels = Zip::from(confirmed)
        .and(landcover.data())
        .map_collect(|&c, &lc| match c {
            true if lc == params.forest_class => FOREST_LOSS,
            true if lc == params.rangeland_class => RANGELAND_LOSS,
            _ => LABEL_NODATA,
        });
    let mut output = landcover.with_data(labels)?;
    output.set_nodata(Some(LABEL_NODATA));
    Ok(output)
}

/// Force every false-mask cell back to no-data. Idempotent.
pub fn apply_false_mask(labels: &mut Raster<u8>, false_mask: &Raster<u8>, params: &LabelParams) -> Result<()> {
    if labels.shape() != false_mask.shape() {
        let (er, ec) = labels.shape();
        let (ar, ac) = false_mask.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    Zip::from(labels.data_mut())
        .and(false_mask.data())
        .for_each(|label, &flag| {
            if flag == params.false_mask_value {
                *label = LABEL_NODATA;
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: Vec<u8>) -> Raster<u8> {
        Raster::from_vec(values, 2, 3).unwrap()
    }

    #[test]
    fn test_labels_by_land_cover() {
        let confirmed =
            Array2::from_shape_vec((2, 3), vec![true, true, true, false, false, true]).unwrap();
        let lc = grid(vec![0, 1, 7, 0, 1, 0]);

        let labels = assign_labels(&confirmed, &lc, &LabelParams::default()).unwrap();
        let values: Vec<u8> = labels.data().iter().copied().collect();
        assert_eq!(values, vec![0, 1, 255, 255, 255, 0]);
        assert_eq!(labels.nodata(), Some(255));
    }

    #[test]
    fn test_false_mask_veto() {
        let mut labels = grid(vec![0, 1, 255, 0, 1, 255]);
        let mask = grid(vec![1, 0, 1, 0, 1, 0]);

        apply_false_mask(&mut labels, &mask, &LabelParams::default()).unwrap();
        let values: Vec<u8> = labels.data().iter().copied().collect();
        assert_eq!(values, vec![255, 1, 255, 0, 255, 255]);
    }

    #[test]
    fn test_false_mask_is_idempotent() {
        let mask = grid(vec![1, 0, 1, 0, 1, 0]);
        let mut once = grid(vec![0, 1, 0, 1, 0, 1]);
        apply_false_mask(&mut once, &mask, &LabelParams::default()).unwrap();

        let mut twice = once.clone();
        apply_false_mask(&mut twice, &mask, &LabelParams::default()).unwrap();
        assert_eq!(once.data(), twice.data());
    }

    #[test]
    fn test_false_mask_only_matches_flag_value() {
        let mut labels = grid(vec![0; 6]);
        let mask = grid(vec![0, 2, 255, 1, 3, 0]);
        apply_false_mask(&mut labels, &mask, &LabelParams::default()).unwrap();
        let values: Vec<u8> = labels.data().iter().copied().collect();
        assert_eq!(values, vec![0, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn test_shape_checks() {
        let confirmed = Array2::from_elem((3, 3), true);
        assert!(matches!(
            assign_labels(&confirmed, &grid(vec![0; 6]), &LabelParams::default()),
            Err(Error::SizeMismatch { .. })
        ));

        let mut labels = grid(vec![0; 6]);
        let mask = Raster::filled(3, 2, 0u8);
        assert!(apply_false_mask(&mut labels, &mask, &LabelParams::default()).is_err());
    }
}
