use std::time::Duration;

use thiserror::Error;

use crate::{features::FeatureConfig, pipeline::FailurePolicy};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub model: ModelConfig,
    pub failure_policy: FailurePolicy,
    pub validation: ValidationMode,
    pub features: FeatureConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
    /// Upper bound on one pipeline invocation; `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: String,
    pub version: String,
    pub threshold: f64,
}

/// How much the transport boundary checks before a record enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Id, a recognised post kind and at least one content field.
    #[default]
    Strict,
    /// Only the post id.
    Lenient,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub cache_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
