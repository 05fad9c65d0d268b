use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::artifact::{ArtifactFormatError, ModelArtifact};
use crate::{config::ModelConfig, domain::ModelMetadata};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model artifact not found: {}", .path.display())]
    ArtifactNotFound { path: PathBuf },
    #[error("model artifact {} is corrupt", .path.display())]
    ArtifactCorrupt {
        path: PathBuf,
        #[source]
        source: ArtifactFormatError,
    },
    #[error("failed to read model artifact {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Owns the model artifact for the life of the process.
///
/// The first [`load`](Self::load) reads and parses the file; concurrent callers
/// block until it finishes and every later call returns the same instance.
pub struct ModelRegistry {
    path: PathBuf,
    metadata: ModelMetadata,
    artifact: OnceCell<Arc<ModelArtifact>>,
    disk_loads: AtomicUsize,
}

impl ModelRegistry {
    pub fn new(path: impl Into<PathBuf>, metadata: ModelMetadata) -> Self {
        let path = path.into();
        tracing::info!(
            target: "model",
            path = %path.display(),
            version = %metadata.version,
            threshold = metadata.threshold,
            "model registry initialized"
        );
        Self {
            path,
            metadata,
            artifact: OnceCell::new(),
            disk_loads: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            &config.path,
            ModelMetadata {
                version: config.version.clone(),
                threshold: config.threshold,
            },
        )
    }

    /// A registry around an artifact built in memory; never touches storage.
    #[cfg(test)]
    pub fn preloaded(metadata: ModelMetadata, artifact: ModelArtifact) -> Self {
        Self {
            path: PathBuf::new(),
            metadata,
            artifact: OnceCell::with_value(Arc::new(artifact)),
            disk_loads: AtomicUsize::new(0),
        }
    }

    pub fn load(&self) -> Result<Arc<ModelArtifact>, RegistryError> {
        self.artifact
            .get_or_try_init(|| self.read_artifact().map(Arc::new))
            .cloned()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.get().is_some()
    }

    /// Number of times the artifact file has been read.
    pub fn load_count(&self) -> usize {
        self.disk_loads.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_artifact(&self) -> Result<ModelArtifact, RegistryError> {
        self.disk_loads.fetch_add(1, Ordering::SeqCst);
        if !self.path.exists() {
            tracing::error!(target: "model", path = %self.path.display(), "model artifact not found");
            return Err(RegistryError::ArtifactNotFound {
                path: self.path.clone(),
            });
        }

        tracing::info!(target: "model", path = %self.path.display(), "loading model artifact");
        let parsed = if is_onnx(&self.path) {
            read_onnx(&self.path)
        } else {
            let raw = fs::read(&self.path).map_err(|source| RegistryError::Io {
                path: self.path.clone(),
                source,
            })?;
            ModelArtifact::from_json(&raw)
        };
        let artifact = parsed.map_err(|source| {
            tracing::error!(
                target: "model",
                path = %self.path.display(),
                error = %source,
                "failed to deserialize model artifact"
            );
            RegistryError::ArtifactCorrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        tracing::info!(
            target: "model",
            version = %self.metadata.version,
            "model artifact loaded"
        );
        Ok(artifact)
    }
}

fn is_onnx(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
}

#[cfg(feature = "onnx")]
fn read_onnx(path: &Path) -> Result<ModelArtifact, ArtifactFormatError> {
    let classifier = super::onnx::OnnxClassifier::load(path)?;
    Ok(ModelArtifact::new(Box::new(classifier)))
}

#[cfg(not(feature = "onnx"))]
fn read_onnx(_path: &Path) -> Result<ModelArtifact, ArtifactFormatError> {
    Err(ArtifactFormatError::Invalid(
        "ONNX artifacts require building with the `onnx` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    const ARTIFACT: &str = r#"{"model": {"type": "prior", "class_probabilities": [0.4, 0.6]}}"#;

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            version: "1.2.3".into(),
            threshold: 0.7,
        }
    }

    #[test]
    fn metadata_is_available_before_load() {
        let registry = ModelRegistry::new("/nonexistent/model.json", metadata());
        assert_eq!(registry.metadata().version, "1.2.3");
        assert_eq!(registry.metadata().threshold, 0.7);
        assert!(!registry.is_loaded());
        assert_eq!(registry.load_count(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let registry = ModelRegistry::new("/nonexistent/model.json", metadata());
        assert!(matches!(
            registry.load(),
            Err(RegistryError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn unparseable_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"{\"model\": 42}").unwrap();
        let registry = ModelRegistry::new(&path, metadata());
        assert!(matches!(
            registry.load(),
            Err(RegistryError::ArtifactCorrupt { .. })
        ));
        assert!(!registry.is_loaded());
    }

    #[test]
    fn repeated_loads_reuse_the_cached_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, ARTIFACT).unwrap();
        let registry = ModelRegistry::new(&path, metadata());

        let first = registry.load().unwrap();
        fs::remove_file(&path).unwrap();
        let second = registry.load().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.load_count(), 1);
    }

    #[test]
    fn concurrent_first_access_reads_the_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, ARTIFACT).unwrap();
        let registry = ModelRegistry::new(&path, metadata());

        let loaded: Vec<Arc<ModelArtifact>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || {
                        thread::sleep(Duration::from_millis((i % 4) as u64));
                        registry.load().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.load_count(), 1);
        assert!(loaded.iter().all(|a| Arc::ptr_eq(a, &loaded[0])));
    }

    #[test]
    fn onnx_artifact_that_cannot_be_loaded_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ONNX");
        fs::write(&path, b"not a protobuf graph").unwrap();
        let registry = ModelRegistry::new(&path, metadata());
        assert!(matches!(
            registry.load(),
            Err(RegistryError::ArtifactCorrupt { .. })
        ));
        assert_eq!(registry.load_count(), 1);
    }

    #[test]
    fn preloaded_registry_never_reads_storage() {
        let artifact = ModelArtifact::from_json(ARTIFACT.as_bytes()).unwrap();
        let registry = ModelRegistry::preloaded(metadata(), artifact);
        assert!(registry.is_loaded());
        registry.load().unwrap();
        assert_eq!(registry.load_count(), 0);
    }
}
