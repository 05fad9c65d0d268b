use serde::Deserialize;
use thiserror::Error;

use crate::domain::FeatureVector;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("feature {0} required by the model was not extracted")]
    MissingFeature(String),
    #[error("model produced a non-finite value")]
    NonFinite,
    #[error("{0}")]
    Other(String),
}

/// Model-specific row transform applied before classification (scaling, encoding).
pub trait FeatureTransform: Send + Sync {
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Row width the transform accepts, when fixed.
    fn input_width(&self) -> Option<usize> {
        None
    }
}

/// Probabilistic classifier over a single feature row. Returns one
/// probability per class, in class order.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Row width the classifier accepts, when fixed.
    fn input_width(&self) -> Option<usize> {
        None
    }
}

/// Immutable bundle of an optional transform and a classifier.
pub struct ModelArtifact {
    feature_names: Option<Vec<String>>,
    transform: Option<Box<dyn FeatureTransform>>,
    classifier: Box<dyn Classifier>,
}

impl ModelArtifact {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self {
            feature_names: None,
            transform: None,
            classifier,
        }
    }

    #[cfg(test)]
    pub fn with_transform(mut self, transform: Box<dyn FeatureTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Feature names the artifact was trained against, in column order.
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Width of the row [`row`](Self::row) must produce, when the model fixes it.
    pub fn input_width(&self) -> Option<usize> {
        self.transform
            .as_ref()
            .and_then(|transform| transform.input_width())
            .or_else(|| self.classifier.input_width())
    }

    pub fn transform(&self) -> Option<&dyn FeatureTransform> {
        self.transform.as_deref()
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Builds the model input row. When the artifact was trained against named
    /// features the row follows that order, otherwise the extractor's order.
    pub fn row(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        match &self.feature_names {
            None => Ok(features.values()),
            Some(names) => names
                .iter()
                .map(|name| {
                    features
                        .get(name)
                        .ok_or_else(|| ModelError::MissingFeature(name.clone()))
                })
                .collect(),
        }
    }

    /// Parses the JSON artifact format:
    ///
    /// ```json
    /// {
    ///   "feature_names": ["has_text", "..."],
    ///   "preprocessing": {"type": "standard_scaler", "mean": [..], "scale": [..]},
    ///   "model": {"type": "logistic_regression", "coefficients": [[..]], "intercepts": [..]}
    /// }
    /// ```
    ///
    /// `feature_names` and `preprocessing` are optional; `model` may also be
    /// `{"type": "prior", "class_probabilities": [..]}`.
    pub fn from_json(raw: &[u8]) -> Result<Self, ArtifactFormatError> {
        let document: ArtifactDocument = serde_json::from_slice(raw)?;
        document.build()
    }
}

#[derive(Debug, Error)]
pub enum ArtifactFormatError {
    #[error("malformed artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent artifact: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ArtifactDocument {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    preprocessing: Option<TransformSpec>,
    model: ClassifierSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TransformSpec {
    StandardScaler { mean: Vec<f64>, scale: Vec<f64> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClassifierSpec {
    LogisticRegression {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    Prior {
        class_probabilities: Vec<f64>,
    },
}

impl ArtifactDocument {
    fn build(self) -> Result<ModelArtifact, ArtifactFormatError> {
        let (classifier, width): (Box<dyn Classifier>, Option<usize>) = match self.model {
            ClassifierSpec::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                let model = LogisticRegression::new(coefficients, intercepts)
                    .map_err(ArtifactFormatError::Invalid)?;
                let width = model.n_features();
                (Box::new(model) as Box<dyn Classifier>, Some(width))
            }
            ClassifierSpec::Prior {
                class_probabilities,
            } => {
                let prior =
                    PriorClassifier::new(class_probabilities).map_err(ArtifactFormatError::Invalid)?;
                (Box::new(prior) as Box<dyn Classifier>, None)
            }
        };

        let transform = match self.preprocessing {
            Some(TransformSpec::StandardScaler { mean, scale }) => {
                let scaler =
                    StandardScaler::new(mean, scale).map_err(ArtifactFormatError::Invalid)?;
                if let Some(width) = width.filter(|w| *w != scaler.mean.len()) {
                    return Err(ArtifactFormatError::Invalid(format!(
                        "scaler has {} columns but the model expects {width}",
                        scaler.mean.len()
                    )));
                }
                Some(Box::new(scaler) as Box<dyn FeatureTransform>)
            }
            None => None,
        };

        if let (Some(names), Some(width)) = (&self.feature_names, width) {
            if names.len() != width {
                return Err(ArtifactFormatError::Invalid(format!(
                    "{} feature names declared but the model expects {width}",
                    names.len()
                )));
            }
        }

        let mut artifact = ModelArtifact::new(classifier);
        artifact.feature_names = self.feature_names;
        artifact.transform = transform;
        Ok(artifact)
    }
}

/// `(x - mean) / scale`; zero scales are treated as 1.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        if mean.len() != scale.len() {
            return Err(format!(
                "scaler mean has {} entries, scale has {}",
                mean.len(),
                scale.len()
            ));
        }
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(Self { mean, scale })
    }
}

impl FeatureTransform for StandardScaler {
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

/// One coefficient row gives a binary model (`[1 - p, p]`); several rows give
/// a multinomial model with one softmax column per row.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LogisticRegression {
    pub fn new(coefficients: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self, String> {
        let width = match coefficients.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => return Err("logistic regression needs at least one coefficient".to_string()),
        };
        if coefficients.iter().any(|row| row.len() != width) {
            return Err("coefficient rows differ in length".to_string());
        }
        if intercepts.len() != coefficients.len() {
            return Err(format!(
                "{} intercepts for {} coefficient rows",
                intercepts.len(),
                coefficients.len()
            ));
        }
        Ok(Self {
            coefficients,
            intercepts,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients[0].len()
    }

    fn decision(&self, row: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, bias)| weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect()
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }
        let scores = self.decision(row);
        let probabilities = if let [z] = scores.as_slice() {
            let p = sigmoid(*z);
            vec![1.0 - p, p]
        } else {
            softmax(&scores)
        };
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(probabilities)
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.n_features())
    }
}

/// Ignores the input and returns fixed class priors.
#[derive(Debug, Clone)]
pub struct PriorClassifier {
    class_probabilities: Vec<f64>,
}

impl PriorClassifier {
    pub fn new(class_probabilities: Vec<f64>) -> Result<Self, String> {
        if class_probabilities.is_empty() {
            return Err("prior needs at least one class".to_string());
        }
        if class_probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err("class probabilities must be within [0, 1]".to_string());
        }
        let total: f64 = class_probabilities.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(format!("class probabilities sum to {total}, expected 1"));
        }
        Ok(Self {
            class_probabilities,
        })
    }
}

impl Classifier for PriorClassifier {
    fn predict_proba(&self, _row: &[f64]) -> Result<Vec<f64>, ModelError> {
        Ok(self.class_probabilities.clone())
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
