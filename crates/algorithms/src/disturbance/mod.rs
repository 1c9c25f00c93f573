//! Land-disturbance detection from CHMAP change rasters
//!
//! The detection runs in three steps over an aligned window:
//! - **Thresholds**: strong and weak evidence of change from the blue, red,
//!   NIR and chi-square bands, with excluded land-cover classes masked
//! - **Confidence expansion**: weak detections are kept only within a
//!   Chebyshev radius of a co-detected (strong and weak) seed
//! - **Labels**: confirmed change becomes forest loss (0) or rangeland loss
//!   (1) by land cover; false-mask sites and everything else are 255
//!
//! [`DisturbancePipeline`] wraps the detection with reprojection, alignment
//! and GeoTIFF I/O for one CHMAP file.

mod expansion;
mod labels;
mod params;
mod pipeline;
mod proximity;
mod thresholds;

pub use expansion::confirm_changes;
pub use labels::{apply_false_mask, assign_labels};
pub use params::{
    DisturbanceParams, ExpansionParams, LabelParams, OpenInterval, RuleSet, ThresholdParams,
    FAR_FROM_SEED, FOREST_LOSS, LABEL_NODATA, NEAR_SEED, RANGELAND_LOSS,
};
pub use pipeline::{bin_path_for, DisturbancePipeline, PipelineConfig, TileOutcome};
pub use proximity::{proximity, DistanceMetric, Proximity, ProximityParams};
pub use thresholds::{classify_thresholds, Evidence};

use dectree_core::raster::{BandStack, ChangeBand, Raster};
use dectree_core::{Algorithm, Error, Result};
use tracing::debug;

/// Disturbance detection algorithm
#[derive(Debug, Clone, Default)]
pub struct DisturbanceDetector;

impl Algorithm for DisturbanceDetector {
    /// (change bands, land cover, false mask), all over the same window
    type Input = (BandStack<f64>, Raster<u8>, Raster<u8>);
    type Output = Raster<u8>;
    type Params = DisturbanceParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DisturbanceDetector"
    }

    fn description(&self) -> &'static str {
        "Forest and rangeland disturbance labels from a bi-temporal change raster"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (stack, landcover, false_mask) = input;
        detect_disturbance(&stack, &landcover, &false_mask, &params)
    }
}

/// Label disturbance over already-windowed inputs.
///
/// All inputs must share one shape. The output is georeferenced like the
/// change bands and uses 255 as no-data.
pub fn detect_disturbance(
    stack: &BandStack<f64>,
    landcover: &Raster<u8>,
    false_mask: &Raster<u8>,
    params: &DisturbanceParams,
) -> Result<Raster<u8>> {
    params.validate()?;

    let evidence = classify_thresholds(stack, landcover, &params.thresholds)?;
    debug!(
        "evidence: {} strong, {} weak cells",
        evidence.strong_count(),
        evidence.weak_count()
    );

    let confirmed = confirm_changes(&evidence, &params.expansion)?;
    let mut labels = assign_labels(&confirmed, landcover, &params.labels)?;
    apply_false_mask(&mut labels, false_mask, &params.labels)?;

    let bands = stack.band(ChangeBand::Blue)?;
    labels.set_transform(*bands.transform());
    labels.set_crs(bands.crs().cloned());
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dectree_core::GeoTransform;

    const SIZE: usize = 20;

    struct Scene {
        bands: [Raster<f64>; 5],
    }

    impl Scene {
        fn empty() -> Self {
            let band = || {
                let mut r = Raster::new(SIZE, SIZE);
                r.set_transform(GeoTransform::new(5_000.0, 9_000.0, 10.0, -10.0));
                r
            };
            Self {
                bands: [band(), band(), band(), band(), band()],
            }
        }

        fn paint(&mut self, row: usize, col: usize, blue: f64, red: f64, nir: f64, stat: f64) {
            for (band, value) in [(0, blue), (2, red), (3, nir), (4, stat)] {
                self.bands[band].set(row, col, value).unwrap();
            }
        }

        fn seed(&mut self, row: usize, col: usize) {
            self.paint(row, col, 6.0, -3.0, -3.0, 800.0);
        }

        fn weak_only(&mut self, row: usize, col: usize) {
            self.paint(row, col, 5.0, -2.0, -2.0, 1800.0);
        }

        fn stack(&self) -> BandStack<f64> {
            BandStack::new(self.bands.to_vec()).unwrap()
        }
    }

    fn detect(scene: &Scene, landcover: &Raster<u8>, mask: &Raster<u8>) -> Raster<u8> {
        detect_disturbance(&scene.stack(), landcover, mask, &DisturbanceParams::default()).unwrap()
    }

    fn zeros() -> Raster<u8> {
        Raster::filled(SIZE, SIZE, 0)
    }

    fn block(r0: usize, c0: usize) -> impl Iterator<Item = (usize, usize)> {
        (r0..r0 + 3).flat_map(move |r| (c0..c0 + 3).map(move |c| (r, c)))
    }

    #[test]
    fn test_all_zero_input_is_all_nodata() {
        let labels = detect(&Scene::empty(), &zeros(), &zeros());
        assert!(labels.data().iter().all(|&v| v == LABEL_NODATA));
        assert_eq!(labels.nodata(), Some(255));
    }

    #[test]
    fn test_seed_block_on_forest() {
        let mut scene = Scene::empty();
        block(4, 4).for_each(|(r, c)| scene.seed(r, c));

        let labels = detect(&scene, &zeros(), &zeros());
        for ((r, c), &v) in labels.data().indexed_iter() {
            let inside = (4..7).contains(&r) && (4..7).contains(&c);
            assert_eq!(v, if inside { FOREST_LOSS } else { LABEL_NODATA }, "cell ({r}, {c})");
        }
        assert_eq!(labels.transform().origin_x, 5_000.0);
    }

    #[test]
    fn test_seed_block_on_rangeland() {
        let mut scene = Scene::empty();
        let mut landcover = zeros();
        for (r, c) in block(10, 12) {
            scene.seed(r, c);
            landcover.set(r, c, 1).unwrap();
        }

        let labels = detect(&scene, &landcover, &zeros());
        assert!(block(10, 12).all(|(r, c)| labels.get(r, c).unwrap() == RANGELAND_LOSS));
        assert_eq!(labels.data().iter().filter(|&&v| v != LABEL_NODATA).count(), 9);
    }

    #[test]
    fn test_isolated_weak_detection_is_noise() {
        let mut scene = Scene::empty();
        scene.seed(2, 2);
        scene.weak_only(9, 5);
        scene.weak_only(7, 6);

        let labels = detect(&scene, &zeros(), &zeros());
        assert_eq!(labels.get(2, 2).unwrap(), FOREST_LOSS);
        // 7 pixels from the seed
        assert_eq!(labels.get(9, 5).unwrap(), LABEL_NODATA);
        // 5 pixels from the seed
        assert_eq!(labels.get(7, 6).unwrap(), FOREST_LOSS);
    }

    #[test]
    fn test_excluded_and_vetoed_cells() {
        let mut scene = Scene::empty();
        block(0, 0).for_each(|(r, c)| scene.seed(r, c));
        let mut landcover = zeros();
        landcover.set(0, 0, 3).unwrap();
        let mut mask = zeros();
        mask.set(2, 2, 1).unwrap();

        let labels = detect(&scene, &landcover, &mask);
        assert_eq!(labels.get(0, 0).unwrap(), LABEL_NODATA);
        assert_eq!(labels.get(2, 2).unwrap(), LABEL_NODATA);
        assert_eq!(labels.get(1, 1).unwrap(), FOREST_LOSS);
    }

    #[test]
    fn test_veto_before_or_after_confirmation() {
        let mut scene = Scene::empty();
        block(5, 5).for_each(|(r, c)| scene.seed(r, c));
        scene.weak_only(9, 9);
        let mut mask = zeros();
        for (r, c) in [(5, 5), (6, 7), (9, 9), (0, 0)] {
            mask.set(r, c, 1).unwrap();
        }
        let params = DisturbanceParams::default();

        let after = detect(&scene, &zeros(), &mask);

        let evidence = classify_thresholds(&scene.stack(), &zeros(), &params.thresholds).unwrap();
        let mut confirmed = confirm_changes(&evidence, &params.expansion).unwrap();
        confirmed.zip_mut_with(mask.data(), |c, &m| *c = *c && m != 1);
        let mut before = assign_labels(&confirmed, &zeros(), &params.labels).unwrap();
        apply_false_mask(&mut before, &mask, &params.labels).unwrap();

        assert_eq!(before.data(), after.data());
        assert!(mask
            .data()
            .indexed_iter()
            .filter(|(_, &m)| m == 1)
            .all(|(idx, _)| after.data()[idx] == LABEL_NODATA));
    }

    #[test]
    fn test_algorithm_trait() {
        let mut scene = Scene::empty();
        scene.seed(3, 3);
        let out = DisturbanceDetector
            .execute_default((scene.stack(), zeros(), zeros()))
            .unwrap();
        assert_eq!(out.get(3, 3).unwrap(), FOREST_LOSS);
    }

    #[test]
    fn test_mismatched_false_mask() {
        let result = detect_disturbance(
            &Scene::empty().stack(),
            &zeros(),
            &Raster::filled(SIZE, SIZE + 1, 0),
            &DisturbanceParams::default(),
        );
        assert!(matches!(result, Err(Error::SizeMismatch { .. })));
    }
}
