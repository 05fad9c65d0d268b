use std::{env, str::FromStr, time::Duration};

use semver::Version;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LoggingConfig, ModelConfig, ServiceConfig,
    ValidationMode,
};
use crate::{features::FeatureConfig, pipeline::FailurePolicy};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    /// Builds the configuration from a key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout_ms: u64 = parse_or(&get, "REQUEST_TIMEOUT_MS", 30_000)?;
        let service = ServiceConfig {
            host: get("SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "SERVICE_PORT", 8000)?,
            version: get("SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            request_timeout: (request_timeout_ms > 0)
                .then(|| Duration::from_millis(request_timeout_ms)),
        };

        let model_version = get("MODEL_VERSION").unwrap_or_else(|| "1.0.0".to_string());
        if let Err(err) = Version::parse(&model_version) {
            return Err(ConfigError::Invalid {
                key: "MODEL_VERSION",
                value: model_version,
                reason: err.to_string(),
            });
        }

        let threshold: f64 = parse_or(&get, "MODEL_THRESHOLD", 0.5)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "MODEL_THRESHOLD",
                value: threshold.to_string(),
                reason: "threshold must be within [0, 1]".to_string(),
            });
        }

        let model = ModelConfig {
            path: get("MODEL_PATH").unwrap_or_else(|| "models/model.json".to_string()),
            version: model_version,
            threshold,
        };

        let failure_policy = match get("FAILURE_POLICY") {
            None => FailurePolicy::default(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "strict" => FailurePolicy::Strict,
                "degraded" => FailurePolicy::Degraded,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "FAILURE_POLICY",
                        value,
                        reason: "expected `strict` or `degraded`".to_string(),
                    })
                }
            },
        };

        let validation = match get("VALIDATION_MODE") {
            None => ValidationMode::default(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "strict" => ValidationMode::Strict,
                "lenient" => ValidationMode::Lenient,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "VALIDATION_MODE",
                        value,
                        reason: "expected `strict` or `lenient`".to_string(),
                    })
                }
            },
        };

        let defaults = FeatureConfig::default();
        let features = FeatureConfig {
            use_structural: parse_bool(&get, "FEATURES_USE_STRUCTURAL", defaults.use_structural)?,
            use_text: parse_bool(&get, "FEATURES_USE_TEXT", defaults.use_text)?,
            use_image: parse_bool(&get, "FEATURES_USE_IMAGE", defaults.use_image)?,
            use_emotional: parse_bool(&get, "FEATURES_USE_EMOTIONAL", defaults.use_emotional)?,
            use_embeddings: parse_bool(&get, "FEATURES_USE_EMBEDDINGS", defaults.use_embeddings)?,
            batch_size: parse_or(&get, "FEATURES_BATCH_SIZE", defaults.batch_size)?,
            text_embedding_dim: parse_or(
                &get,
                "FEATURES_TEXT_EMBEDDING_DIM",
                defaults.text_embedding_dim,
            )?,
            image_embedding_dim: parse_or(
                &get,
                "FEATURES_IMAGE_EMBEDDING_DIM",
                defaults.image_embedding_dim,
            )?,
            device: get("FEATURES_DEVICE").unwrap_or(defaults.device),
            use_cache: parse_bool(&get, "FEATURES_USE_CACHE", defaults.use_cache)?,
            cache_capacity: parse_or(&get, "FEATURES_CACHE_CAPACITY", defaults.cache_capacity)?,
            max_text_chars: parse_or(&get, "FEATURES_MAX_TEXT_CHARS", defaults.max_text_chars)?,
        };

        let directories = DirectoryConfig {
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            cache_dir: get("CACHE_DIR").unwrap_or_else(|| "cache".to_string()),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            service,
            model,
            failure_policy,
            validation,
            features,
            directories,
            logging,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|err| ConfigError::Invalid {
            key,
            value,
            reason: err.to_string(),
        }),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}
