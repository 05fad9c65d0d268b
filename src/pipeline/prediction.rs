use std::sync::Arc;

use uuid::Uuid;

use super::{FailurePolicy, PipelineError};
use crate::{
    domain::{FeatureVector, ModelMetadata, PostRecord, PredictionResult},
    features::FeatureExtractor,
    model::{ArtifactFormatError, ModelArtifact, ModelError, ModelRegistry, RegistryError},
    preprocessing::Preprocessor,
};

const POSITIVE_CLASS: usize = 1;
const BINARY_COLUMNS: usize = 2;
const SHAPE_MISMATCH_PROBABILITY: f64 = 0.5;
const HARD_FAILURE_PROBABILITY: f64 = 0.0;

/// Failures inside transform -> probabilities -> positive class.
enum ProbabilityFailure {
    Shape { columns: usize },
    Model(ModelError),
}

/// Preprocessor -> feature extractor -> model, with one correlation id per call.
///
/// Holds no per-call state; share it behind an `Arc` across request handlers.
pub struct PredictionPipeline {
    preprocessor: Preprocessor,
    extractor: Arc<dyn FeatureExtractor>,
    registry: Arc<ModelRegistry>,
    policy: FailurePolicy,
}

impl PredictionPipeline {
    /// Loads the model up front so a missing or broken artifact fails startup
    /// rather than every request.
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        registry: Arc<ModelRegistry>,
        policy: FailurePolicy,
    ) -> Result<Self, RegistryError> {
        let preloaded = registry.is_loaded();
        let artifact = registry.load()?;
        check_layout(&artifact, extractor.feature_names()).map_err(|reason| {
            tracing::error!(
                target: "pipeline",
                path = %registry.path().display(),
                %reason,
                "model does not fit the extracted features"
            );
            RegistryError::ArtifactCorrupt {
                path: registry.path().to_path_buf(),
                source: ArtifactFormatError::Invalid(reason),
            }
        })?;
        tracing::info!(
            target: "pipeline",
            policy = %policy,
            preloaded,
            artifact_reads = registry.load_count(),
            threshold = registry.metadata().threshold,
            features = extractor.feature_names().len(),
            "prediction pipeline initialized"
        );
        Ok(Self {
            preprocessor: Preprocessor::new(),
            extractor,
            registry,
            policy,
        })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        self.registry.metadata()
    }

    pub fn predict(&self, record: &PostRecord) -> Result<PredictionResult, PipelineError> {
        let request_id = Uuid::new_v4();
        let tweet_id = record
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or("unknown")
            .to_string();
        tracing::info!(
            target: "pipeline",
            %request_id,
            %tweet_id,
            "running prediction"
        );

        let normalized = self.preprocessor.preprocess(record);

        let features = self.extractor.extract(&normalized).map_err(|err| {
            tracing::error!(
                target: "pipeline",
                %request_id,
                %tweet_id,
                error = %err,
                "feature extraction failed"
            );
            PipelineError::from(err)
        })?;

        let artifact = self.registry.load().map_err(|err| {
            tracing::error!(
                target: "pipeline",
                %request_id,
                %tweet_id,
                error = %err,
                "model unavailable"
            );
            PipelineError::PredictionFailed(err.to_string())
        })?;

        let probability = match positive_probability(&artifact, &features) {
            Ok(probability) => probability,
            Err(failure) => self.absorb(failure, request_id, &tweet_id)?,
        };

        let label = self.metadata().label(probability);
        tracing::info!(
            target: "pipeline",
            %request_id,
            %tweet_id,
            probability,
            label = label.as_str(),
            "prediction complete"
        );

        Ok(PredictionResult {
            request_id,
            tweet_id,
            probability,
        })
    }

    /// Applies the failure policy to a probability-stage failure.
    fn absorb(
        &self,
        failure: ProbabilityFailure,
        request_id: Uuid,
        tweet_id: &str,
    ) -> Result<f64, PipelineError> {
        match failure {
            ProbabilityFailure::Shape { columns } => {
                tracing::error!(
                    target: "pipeline",
                    %request_id,
                    %tweet_id,
                    columns,
                    policy = %self.policy,
                    "model returned {columns} probability columns, expected {BINARY_COLUMNS}"
                );
                match self.policy {
                    FailurePolicy::Strict => Err(PipelineError::UnexpectedModelOutput { columns }),
                    FailurePolicy::Degraded => Ok(SHAPE_MISMATCH_PROBABILITY),
                }
            }
            ProbabilityFailure::Model(err) => {
                tracing::error!(
                    target: "pipeline",
                    %request_id,
                    %tweet_id,
                    error = %err,
                    policy = %self.policy,
                    "probability computation failed"
                );
                match self.policy {
                    FailurePolicy::Strict => Err(PipelineError::PredictionFailed(err.to_string())),
                    FailurePolicy::Degraded => Ok(HARD_FAILURE_PROBABILITY),
                }
            }
        }
    }
}

/// The row the model will receive must be buildable from what the extractor produces.
fn check_layout(artifact: &ModelArtifact, produced: &[String]) -> Result<(), String> {
    let width = match artifact.feature_names() {
        Some(names) => {
            if let Some(missing) = names.iter().find(|name| !produced.contains(name)) {
                return Err(format!(
                    "model expects feature {missing}, which the extractor does not produce"
                ));
            }
            names.len()
        }
        None => produced.len(),
    };
    match artifact.input_width() {
        Some(expected) if expected != width => Err(format!(
            "model expects {expected} features, the extractor provides {width}"
        )),
        _ => Ok(()),
    }
}

fn positive_probability(
    artifact: &ModelArtifact,
    features: &FeatureVector,
) -> Result<f64, ProbabilityFailure> {
    let mut row = artifact.row(features).map_err(ProbabilityFailure::Model)?;
    if let Some(transform) = artifact.transform() {
        row = transform.transform(&row).map_err(ProbabilityFailure::Model)?;
    }
    let probabilities = artifact
        .classifier()
        .predict_proba(&row)
        .map_err(ProbabilityFailure::Model)?;
    if probabilities.len() != BINARY_COLUMNS {
        return Err(ProbabilityFailure::Shape {
            columns: probabilities.len(),
        });
    }
    let positive = probabilities[POSITIVE_CLASS];
    if !positive.is_finite() {
        return Err(ProbabilityFailure::Model(ModelError::NonFinite));
    }
    Ok(positive.clamp(0.0, 1.0))
}
