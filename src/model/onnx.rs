use std::path::Path;

use ort::{
    session::Session,
    value::{Tensor, ValueType},
};
use parking_lot::Mutex;

use super::artifact::{ArtifactFormatError, Classifier, ModelError};

/// Classifier backed by an ONNX export (for example a scikit-learn or
/// LightGBM pipeline converted with `zipmap=False`). The probability output
/// must be a `[1, classes]` float tensor.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_width: Option<usize>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Result<Self, ArtifactFormatError> {
        let session = Session::builder()
            .map_err(invalid)?
            .commit_from_file(path)
            .map_err(invalid)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| ArtifactFormatError::Invalid("onnx model has no inputs".into()))?;
        let input_width = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape.last().and_then(|w| usize::try_from(*w).ok()),
            other => {
                return Err(ArtifactFormatError::Invalid(format!(
                    "onnx input must be a tensor, found {other:?}"
                )))
            }
        };
        let input_name = input.name.clone();

        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|output| output.name.clone())
            .ok_or_else(|| ArtifactFormatError::Invalid("onnx model has no outputs".into()))?;

        tracing::info!(
            target: "model",
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            width = ?input_width,
            "onnx model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }
}

fn invalid(err: impl std::fmt::Display) -> ArtifactFormatError {
    ArtifactFormatError::Invalid(format!("onnx session: {err}"))
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if let Some(expected) = self.input_width.filter(|w| *w != row.len()) {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: row.len(),
            });
        }
        let data: Vec<f32> = row.iter().map(|value| *value as f32).collect();
        let tensor = Tensor::from_array(([1_usize, data.len()], data.into_boxed_slice()))
            .map_err(|err| ModelError::Other(format!("onnx input: {err}")))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs! { self.input_name.clone() => tensor.view() })
            .map_err(|err| ModelError::Other(format!("onnx inference: {err}")))?;
        let output = outputs.get(&self.output_name).ok_or_else(|| {
            ModelError::Other(format!("onnx output {} is missing", self.output_name))
        })?;
        let (_, probabilities) = output
            .try_extract_tensor::<f32>()
            .map_err(|err| ModelError::Other(format!("onnx output: {err}")))?;
        Ok(probabilities.iter().map(|p| f64::from(*p)).collect())
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }
}
