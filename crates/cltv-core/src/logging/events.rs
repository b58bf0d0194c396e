//! Structured event vocabulary for logging.
//!
//! Every event carries the run correlation ID and the pipeline stage that
//! emitted it, so JSONL output can be grouped per run and per stage.

use cltv_common::RunId;
use serde::{Deserialize, Serialize};

/// Processing stages in the CLTV pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading customer aggregates.
    Load,
    /// Outlier suppression.
    Suppress,
    /// Feature derivation and qualification.
    Features,
    /// Population-level model fitting.
    Fit,
    /// Per-customer predictions.
    Predict,
    /// Lifetime value synthesis.
    Synthesize,
    /// Value segmentation.
    Segment,
    /// Rendering results.
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Suppress => "suppress",
            Stage::Features => "features",
            Stage::Fit => "fit",
            Stage::Predict => "predict",
            Stage::Synthesize => "synthesize",
            Stage::Segment => "segment",
            Stage::Output => "output",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Load stage
    pub const LOAD_FINISHED: &str = "load.finished";

    // Suppress stage
    pub const SUPPRESS_COLUMN: &str = "suppress.column";

    // Features stage
    pub const FEATURES_REFERENCE_DATE: &str = "features.reference_date";
    pub const FEATURES_DROPPED: &str = "features.dropped";
    pub const FEATURES_DROPPED_IDS: &str = "features.dropped_ids";
    pub const FEATURES_CORRELATION: &str = "features.freq_monetary_correlation";

    // Fit stage
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_FINISHED: &str = "fit.finished";

    // Predict / synthesize stages
    pub const PREDICT_FINISHED: &str = "predict.finished";
    pub const SYNTHESIZE_FINISHED: &str = "synthesize.finished";

    // Segment stage
    pub const SEGMENT_FINISHED: &str = "segment.finished";
    pub const SEGMENT_DEGENERATE: &str = "segment.degenerate";

    // Output stage
    pub const OUTPUT_WRITTEN: &str = "output.written";
}

/// Correlation context shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: RunId,
}

impl LogContext {
    /// Create a new log context.
    pub fn new(run_id: RunId) -> Self {
        LogContext { run_id }
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new(RunId::new())
    }
}
