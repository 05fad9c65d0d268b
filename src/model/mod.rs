mod artifact;
#[cfg(feature = "onnx")]
mod onnx;
mod registry;

pub use artifact::{ArtifactFormatError, Classifier, ModelArtifact, ModelError};
#[cfg(test)]
pub use artifact::{FeatureTransform, LogisticRegression, PriorClassifier, StandardScaler};
pub use registry::{ModelRegistry, RegistryError};
