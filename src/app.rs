use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use crate::{
    api::{self, AppState},
    config::AppConfig,
    features::{FeatureExtractor, TweetFeatureExtractor},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    model::ModelRegistry,
    pipeline::PredictionPipeline,
};

pub struct InferenceApp {
    config: AppConfig,
    paths: ResolvedPaths,
    extractor: Arc<TweetFeatureExtractor>,
    router: Router,
    shutdown: Shutdown,
}

impl InferenceApp {
    /// Builds every component up front. A missing or corrupt model artifact
    /// stops startup here instead of failing requests later.
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let extractor = Arc::new(
            TweetFeatureExtractor::new(config.features.clone())
                .context("invalid feature configuration")?,
        );
        restore_feature_cache(&extractor, &paths);

        let registry = Arc::new(ModelRegistry::from_config(&config.model));
        let shared: Arc<dyn FeatureExtractor> = extractor.clone();
        let pipeline = PredictionPipeline::new(shared, registry, config.failure_policy)
            .context("failed to load model")?;

        let router = api::create_router(AppState {
            pipeline: Arc::new(pipeline),
            validation: config.validation,
            version: config.service.version.clone(),
            request_timeout: config.service.request_timeout,
        });

        Ok(Self {
            config,
            paths,
            extractor,
            router,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let InferenceApp {
            config,
            paths,
            extractor,
            router,
            shutdown,
        } = self;

        if shutdown.is_triggered() {
            tracing::info!(target: "app", "shutdown requested during startup; not serving");
            persist_feature_cache(&extractor, &paths);
            return Ok(());
        }

        let addr = format!("{}:{}", config.service.host, config.service.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!(
            target: "app",
            %addr,
            version = %config.service.version,
            model_version = %config.model.version,
            policy = %config.failure_policy,
            "tweet inference service listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.subscribe().notified())
            .await
            .context("http server failed")?;

        tracing::info!(target: "app", "http server stopped");
        persist_feature_cache(&extractor, &paths);
        Ok(())
    }
}

fn restore_feature_cache(extractor: &TweetFeatureExtractor, paths: &ResolvedPaths) {
    let Some(cache) = extractor.cache() else {
        return;
    };
    match cache.load(&paths.feature_cache, extractor.feature_names()) {
        Ok(restored) => tracing::info!(
            target: "app",
            path = %paths.feature_cache.display(),
            restored,
            "feature cache restored"
        ),
        Err(err) => tracing::warn!(
            target: "app",
            path = %paths.feature_cache.display(),
            error = %err,
            "feature cache snapshot unusable; starting empty"
        ),
    }
}

fn persist_feature_cache(extractor: &TweetFeatureExtractor, paths: &ResolvedPaths) {
    let Some(cache) = extractor.cache() else {
        return;
    };
    match cache.save(&paths.feature_cache, extractor.feature_names()) {
        Ok(()) => tracing::info!(
            target: "app",
            path = %paths.feature_cache.display(),
            entries = cache.len(),
            "feature cache saved"
        ),
        Err(err) => tracing::error!(
            target: "app",
            path = %paths.feature_cache.display(),
            error = %err,
            "failed to save feature cache"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs, time::Duration};

    use super::*;

    const ARTIFACT: &str = r#"{"model": {"type": "prior", "class_probabilities": [0.9, 0.1]}}"#;

    fn config(root: &std::path::Path, model: &str, use_cache: bool) -> AppConfig {
        let vars = HashMap::from([
            ("SERVICE_PORT", "0".to_string()),
            ("MODEL_PATH", root.join(model).to_string_lossy().into_owned()),
            ("FEATURES_USE_CACHE", use_cache.to_string()),
            ("LOGS_DIR", root.join("logs").to_string_lossy().into_owned()),
            ("CACHE_DIR", root.join("cache").to_string_lossy().into_owned()),
        ]);
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn missing_model_is_fatal_at_startup() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), "absent.json", false);
        let paths = ResolvedPaths::prepare(&config.directories).unwrap();
        let (shutdown, _) = Shutdown::new();

        assert!(InferenceApp::initialize(config, paths, shutdown).await.is_err());
    }

    #[tokio::test]
    async fn shutdown_requested_during_startup_is_honoured() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("model.json"), ARTIFACT).unwrap();
        let config = config(root.path(), "model.json", true);
        let paths = ResolvedPaths::prepare(&config.directories).unwrap();
        let snapshot = paths.feature_cache.clone();
        let (shutdown, initial) = Shutdown::new();
        drop(initial);

        let app = InferenceApp::initialize(config, paths, shutdown.clone())
            .await
            .unwrap();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), app.run())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.exists());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_saves_the_cache() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("model.json"), ARTIFACT).unwrap();
        let config = config(root.path(), "model.json", true);
        let paths = ResolvedPaths::prepare(&config.directories).unwrap();
        let snapshot = paths.feature_cache.clone();
        let (shutdown, _) = Shutdown::new();

        let app = InferenceApp::initialize(config, paths, shutdown.clone())
            .await
            .unwrap();
        let server = tokio::spawn(app.run());
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(snapshot.exists());
    }
}
