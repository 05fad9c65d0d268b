pub mod post;
pub mod types;

pub use post::{NormalizedRecord, PostKind, PostRecord};
pub use types::{FeatureVector, ModelMetadata, PredictionResult};
