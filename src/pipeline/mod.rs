mod prediction;

use std::fmt;

use thiserror::Error;

use crate::features::FeatureExtractionError;

pub use prediction::PredictionPipeline;

/// What the pipeline does when the probability stage fails. One policy per
/// deployment; the two differ in what callers observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Failures reach the caller as [`PipelineError`].
    #[default]
    Strict,
    /// Probability-stage failures become a sentinel probability: 0.5 when the
    /// model output has the wrong shape, 0.0 for any other failure.
    Degraded,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Strict => f.write_str("strict"),
            FailurePolicy::Degraded => f.write_str("degraded"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(#[from] FeatureExtractionError),
    #[error("unexpected model output: {columns} probability columns, expected 2")]
    UnexpectedModelOutput { columns: usize },
    #[error("prediction failed: {0}")]
    PredictionFailed(String),
}
