//! Parameters of the disturbance classifier
//!
//! Every numeric constant of the classifier lives here as a named field with
//! the product value as its `Default`, so callers and tests can move one
//! boundary at a time.

use serde::{Deserialize, Serialize};
use dectree_core::{Error, Result};

/// Label for confirmed change on forest land cover
pub const FOREST_LOSS: u8 = 0;
/// Label for confirmed change on rangeland land cover
pub const RANGELAND_LOSS: u8 = 1;
/// No-data / masked label of the output grid
pub const LABEL_NODATA: u8 = 255;

/// Proximity code of cells within the expansion radius of a seed
pub const NEAR_SEED: u8 = 0;
/// Proximity code of cells beyond the expansion radius
pub const FAR_FROM_SEED: u8 = 255;

/// Strict open interval `low < x < high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenInterval {
    pub low: f64,
    pub high: f64,
}

impl OpenInterval {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// NaN is never contained.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.low < value && value < self.high
    }

    /// Whether every value inside `other` is also inside `self`
    pub fn covers(&self, other: &OpenInterval) -> bool {
        self.low <= other.low && other.high <= self.high
    }
}

/// One rule set over the four CHMAP bands the classifier looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub blue: OpenInterval,
    pub red: OpenInterval,
    pub nir: OpenInterval,
    /// Chi-square change statistic
    pub statistic: OpenInterval,
}

impl RuleSet {
    #[inline]
    pub fn matches(&self, blue: f64, red: f64, nir: f64, statistic: f64) -> bool {
        self.blue.contains(blue)
            && self.red.contains(red)
            && self.nir.contains(nir)
            && self.statistic.contains(statistic)
    }

    pub fn covers(&self, other: &RuleSet) -> bool {
        self.blue.covers(&other.blue)
            && self.red.covers(&other.red)
            && self.nir.covers(&other.nir)
            && self.statistic.covers(&other.statistic)
    }
}

/// Thresholds for strong and weak evidence of change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub strong: RuleSet,
    /// Must cover `strong` on every axis
    pub weak: RuleSet,
    /// Cells whose statistic is at or above this value are no-data
    pub nodata_statistic: f64,
    /// Land-cover classes where change is not tracked
    pub excluded_classes: Vec<u8>,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            strong: RuleSet {
                blue: OpenInterval::new(2.0, 10.0),
                red: OpenInterval::new(-5.0, -1.0),
                nir: OpenInterval::new(-5.0, -1.0),
                statistic: OpenInterval::new(150.0, 1500.0),
            },
            weak: RuleSet {
                blue: OpenInterval::new(1.0, 11.0),
                red: OpenInterval::new(-6.0, 0.0),
                nir: OpenInterval::new(-6.0, 0.0),
                statistic: OpenInterval::new(100.0, 2000.0),
            },
            nodata_statistic: 2000.0,
            excluded_classes: vec![2, 3, 4, 5, 6],
        }
    }
}

impl ThresholdParams {
    /// Reject tables where a strong detection would not also be weak
    pub fn validate(&self) -> Result<()> {
        if !self.weak.covers(&self.strong) {
            return Err(Error::InvalidParameter {
                name: "thresholds",
                value: format!("{:?}", self.weak),
                reason: "weak rule set must cover the strong rule set".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn is_excluded(&self, class: u8) -> bool {
        self.excluded_classes.contains(&class)
    }
}

/// Parameters of the proximity-based confidence expansion.
///
/// Seeds are the cells whose evidence equals `seed_evidence`, i.e. cells
/// flagged by both the strong and the weak rule set. A window without any
/// such cell keeps none of its weak detections; whether seeding should also
/// accept weak-only cells is unresolved, and the conservative behaviour is
/// kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpansionParams {
    /// Chebyshev radius in pixels, inclusive
    pub radius: usize,
    /// Evidence value that marks a seed
    pub seed_evidence: u8,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            radius: 5,
            seed_evidence: 2,
        }
    }
}

/// Land-cover codes and false-mask flag used by the labeller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelParams {
    pub forest_class: u8,
    pub rangeland_class: u8,
    /// False-mask value marking a known false-change site
    pub false_mask_value: u8,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            forest_class: 0,
            rangeland_class: 1,
            false_mask_value: 1,
        }
    }
}

/// All parameters of [`detect_disturbance`](super::detect_disturbance)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceParams {
    pub thresholds: ThresholdParams,
    pub expansion: ExpansionParams,
    pub labels: LabelParams,
}

impl DisturbanceParams {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()
    }
}
