//! Bounded proximity transform
//!
//! Distance in pixels from every cell to the nearest cell holding one of a
//! set of target values, computed with an exact two-pass chamfer sweep.
//! Distances up to `max_distance` (inclusive) are reported either as the
//! distance itself or as a fixed code; anything farther, including every cell
//! of a grid without targets, gets `far_value`.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use dectree_core::raster::Raster;
use dectree_core::{Algorithm, Error, Result};

use super::params::{FAR_FROM_SEED, NEAR_SEED};

/// Pixel distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Chessboard distance: diagonal steps cost 1
    #[default]
    Chebyshev,
    /// City-block distance: diagonal steps cost 2
    Manhattan,
}

/// Parameters for the proximity transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityParams {
    /// Source values cells are measured against
    pub target_values: Vec<u8>,
    /// Largest distance (pixels) still reported as near
    pub max_distance: usize,
    pub metric: DistanceMetric,
    /// Value written for near cells; `None` writes the distance
    pub fixed_value: Option<u8>,
    /// Value written beyond `max_distance`
    pub far_value: u8,
}

impl Default for ProximityParams {
    /// Seed proximity as used by the confidence expansion
    fn default() -> Self {
        Self {
            target_values: vec![2],
            max_distance: 5,
            metric: DistanceMetric::Chebyshev,
            fixed_value: Some(NEAR_SEED),
            far_value: FAR_FROM_SEED,
        }
    }
}

impl ProximityParams {
    fn validate(&self) -> Result<()> {
        if self.target_values.is_empty() {
            return Err(Error::InvalidParameter {
                name: "target_values",
                value: "[]".to_string(),
                reason: "at least one target value is required".to_string(),
            });
        }
        if self.fixed_value.is_none() && self.max_distance >= self.far_value as usize {
            return Err(Error::InvalidParameter {
                name: "max_distance",
                value: self.max_distance.to_string(),
                reason: format!("distances must stay below far value {}", self.far_value),
            });
        }
        Ok(())
    }
}

/// Proximity transform algorithm
#[derive(Debug, Clone, Default)]
pub struct Proximity;

impl Algorithm for Proximity {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = ProximityParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Proximity"
    }

    fn description(&self) -> &'static str {
        "Bounded pixel distance to the nearest target-valued cell"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        proximity(&input, &params)
    }
}

/// Compute the bounded proximity raster of `source`.
///
/// The output keeps the source georeferencing and uses `far_value` as its
/// no-data value.
pub fn proximity(source: &Raster<u8>, params: &ProximityParams) -> Result<Raster<u8>> {
    params.validate()?;

    let distances = distance_to_targets(source.data(), &params.target_values, params.metric);
    let cap = params.max_distance.min(u32::MAX as usize) as u32;

    let codes = distances.mapv(|d| {
        if d <= cap {
            params.fixed_value.unwrap_or(d as u8)
        } else {
            params.far_value
        }
    });

    let mut output = source.with_data(codes)?;
    output.set_nodata(Some(params.far_value));
    Ok(output)
}

/// Unbounded pixel distance to the nearest target cell, `u32::MAX` if none.
///
/// Forward sweep propagates from the upper-left neighbours, backward sweep
/// from the lower-right ones; for chessboard and city-block metrics the two
/// sweeps are exact.
fn distance_to_targets(data: &Array2<u8>, targets: &[u8], metric: DistanceMetric) -> Array2<u32> {
    let (rows, cols) = data.dim();
    let mut dist = data.mapv(|v| if targets.contains(&v) { 0 } else { u32::MAX });

    let diagonal = match metric {
        DistanceMetric::Chebyshev => 1,
        DistanceMetric::Manhattan => 2,
    };

    for r in 0..rows {
        for c in 0..cols {
            let mut d = dist[(r, c)];
            if c > 0 {
                d = d.min(dist[(r, c - 1)].saturating_add(1));
            }
            if r > 0 {
                d = d.min(dist[(r - 1, c)].saturating_add(1));
                if c > 0 {
                    d = d.min(dist[(r - 1, c - 1)].saturating_add(diagonal));
                }
                if c + 1 < cols {
                    d = d.min(dist[(r - 1, c + 1)].saturating_add(diagonal));
                }
            }
            dist[(r, c)] = d;
        }
    }

    for r in (0..rows).rev() {
        for c in (0..cols).rev() {
            let mut d = dist[(r, c)];
            if c + 1 < cols {
                d = d.min(dist[(r, c + 1)].saturating_add(1));
            }
            if r + 1 < rows {
                d = d.min(dist[(r + 1, c)].saturating_add(1));
                if c + 1 < cols {
                    d = d.min(dist[(r + 1, c + 1)].saturating_add(diagonal));
                }
                if c > 0 {
                    d = d.min(dist[(r + 1, c - 1)].saturating_add(diagonal));
                }
            }
            dist[(r, c)] = d;
        }
    }

    dist
}
