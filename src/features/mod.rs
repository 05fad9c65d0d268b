//! Feature extraction: normalized post -> named numeric row.
//!
//! The pipeline only depends on [`FeatureExtractor`]; [`TweetFeatureExtractor`]
//! is the built-in implementation whose groups are toggled by [`FeatureConfig`].

mod cache;
mod extractor;
mod lexicon;
mod text;

use thiserror::Error;

use crate::domain::{FeatureVector, NormalizedRecord};

pub use cache::FeatureCache;
pub use extractor::TweetFeatureExtractor;

pub trait FeatureExtractor: Send + Sync {
    /// Names of the features every successful [`extract`](Self::extract) returns, in order.
    fn feature_names(&self) -> &[String];

    fn extract(&self, record: &NormalizedRecord) -> Result<FeatureVector, FeatureExtractionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub use_structural: bool,
    pub use_text: bool,
    pub use_image: bool,
    pub use_emotional: bool,
    pub use_embeddings: bool,
    /// Accepted and validated for configuration compatibility. The built-in
    /// extractor handles one record per call, so it does not change the output.
    pub batch_size: usize,
    pub text_embedding_dim: usize,
    pub image_embedding_dim: usize,
    pub device: String,
    pub use_cache: bool,
    pub cache_capacity: usize,
    pub max_text_chars: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            use_structural: true,
            use_text: true,
            use_image: true,
            use_emotional: true,
            use_embeddings: true,
            batch_size: 32,
            text_embedding_dim: 30,
            image_embedding_dim: 60,
            device: "cpu".to_string(),
            use_cache: false,
            cache_capacity: 4096,
            max_text_chars: 10_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeatureExtractionError {
    #[error("invalid feature configuration: {0}")]
    InvalidConfig(String),
    #[error("{field} has {chars} characters, limit is {limit}")]
    InputTooLarge {
        field: &'static str,
        chars: usize,
        limit: usize,
    },
    #[error("feature {feature} is not a finite number")]
    NonFinite { feature: String },
}
