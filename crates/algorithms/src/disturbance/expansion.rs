//! Confidence expansion: keep weak detections close to co-detected seeds

use ndarray::{Array2, Zip};
use dectree_core::raster::Raster;
use dectree_core::Result;
use tracing::debug;

use super::params::{ExpansionParams, FAR_FROM_SEED, NEAR_SEED};
use super::proximity::{proximity, DistanceMetric, ProximityParams};
use super::thresholds::Evidence;

/// Confirm weak detections lying within `radius` (Chebyshev, inclusive) of a
/// seed cell. The result is always a subset of `evidence.weak`.
pub fn confirm_changes(evidence: &Evidence, params: &ExpansionParams) -> Result<Array2<bool>> {
    let mut seeds = 0usize;
    let mut weak = 0usize;
    let levels = Raster::from_array(Zip::from(&evidence.strong).and(&evidence.weak).map_collect(
        |&s, &w| {
            let level = s as u8 + w as u8;
            seeds += (level == params.seed_evidence) as usize;
            weak += w as usize;
            level
        },
    ));

    if seeds == 0 {
        debug!(
            "no seed cells in {:?} window; {} weak detections discarded",
            evidence.shape(),
            weak
        );
    }

    let near = proximity(
        &levels,
        &ProximityParams {
            target_values: vec![params.seed_evidence],
            max_distance: params.radius,
            metric: DistanceMetric::Chebyshev,
            fixed_value: Some(NEAR_SEED),
            far_value: FAR_FROM_SEED,
        },
    )?;

    let mut kept = 0usize;
    let confirmed = Zip::from(&evidence.weak)
        .and(near.data())
        .map_collect(|&weak, &code| {
            let keep = weak && code == NEAR_SEED;
            kept += keep as usize;
            keep
        });

    debug!("{} seeds, {} weak, {} confirmed", seeds, weak, kept);
    Ok(confirmed)
}
