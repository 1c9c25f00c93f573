//! # DecTree Algorithms
//!
//! Land-disturbance mapping from bi-temporal CHMAP change rasters.
//!
//! ## Modules
//!
//! - **alignment**: geographic intersection of two raster footprints and the
//!   per-raster pixel windows over it
//! - **disturbance**: threshold evidence, proximity transform, confidence
//!   expansion, labelling and the per-file pipeline

pub mod alignment;
pub mod disturbance;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alignment::{align, Alignment, Envelope};
    pub use crate::disturbance::{
        apply_false_mask, assign_labels, bin_path_for, classify_thresholds, confirm_changes,
        detect_disturbance, proximity, DisturbanceDetector, DisturbanceParams,
        DisturbancePipeline, Evidence, ExpansionParams, LabelParams, PipelineConfig, Proximity,
        ProximityParams, ThresholdParams, TileOutcome,
    };
    pub use dectree_core::prelude::*;
}
