//! HTTP surface: health, model info and single-post prediction under `/api`.

mod routes;
mod validation;

use std::{sync::Arc, time::Duration};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{config::ValidationMode, pipeline::PredictionPipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
    pub validation: ValidationMode,
    pub version: String,
    pub request_timeout: Option<Duration>,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/predict", post(routes::predict))
        .route("/model/info", get(routes::model_info));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        domain::ModelMetadata,
        features::{FeatureConfig, FeatureExtractor, TweetFeatureExtractor},
        model::{Classifier, ModelArtifact, ModelError, ModelRegistry, PriorClassifier},
        pipeline::FailurePolicy,
    };

    struct Exploding;

    impl Classifier for Exploding {
        fn predict_proba(&self, _row: &[f64]) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::Other("model state is invalid".into()))
        }
    }

    struct Slow;

    impl Classifier for Slow {
        fn predict_proba(&self, _row: &[f64]) -> Result<Vec<f64>, ModelError> {
            thread::sleep(Duration::from_millis(300));
            Ok(vec![0.5, 0.5])
        }
    }

    fn state_with(
        classifier: Box<dyn Classifier>,
        policy: FailurePolicy,
        validation: ValidationMode,
        request_timeout: Option<Duration>,
    ) -> AppState {
        let extractor: Arc<dyn FeatureExtractor> =
            Arc::new(TweetFeatureExtractor::new(FeatureConfig::default()).unwrap());
        let registry = ModelRegistry::preloaded(
            ModelMetadata {
                version: "2.1.0".into(),
                threshold: 0.65,
            },
            ModelArtifact::new(classifier),
        );
        let pipeline = PredictionPipeline::new(extractor, Arc::new(registry), policy).unwrap();
        AppState {
            pipeline: Arc::new(pipeline),
            validation,
            version: "0.3.0".into(),
            request_timeout,
        }
    }

    fn app() -> Router {
        create_router(state_with(
            Box::new(PriorClassifier::new(vec![0.25, 0.75]).unwrap()),
            FailurePolicy::Strict,
            ValidationMode::Strict,
            Some(Duration::from_secs(5)),
        ))
    }

    fn predict_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn t1() -> String {
        json!({
            "id": "T1",
            "created_at": "2025-01-01",
            "text": "hello",
            "tweet_type": "single"
        })
        .to_string()
    }

    #[tokio::test]
    async fn health_reports_service_version() {
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "version": "0.3.0"}));
    }

    #[tokio::test]
    async fn model_info_reports_version_and_threshold() {
        let request = Request::get("/api/model/info").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"version": "2.1.0", "threshold": 0.65}));
    }

    #[tokio::test]
    async fn predict_returns_probability_for_the_post() {
        let (status, body) = send(app(), predict_request(t1())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tweet_id"], "T1");
        assert_eq!(body["probability"], 0.75);
        let request_id = body["request_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_get_their_own_ids() {
        let router = app();
        let requests = (0..24).map(|i| {
            let body = json!({"id": format!("post-{i}"), "text": "hi", "tweet_type": "QUOTE"});
            send(router.clone(), predict_request(body.to_string()))
        });
        let responses = futures::future::join_all(requests).await;

        let mut request_ids = std::collections::HashSet::new();
        for (i, (status, body)) in responses.into_iter().enumerate() {
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["tweet_id"], format!("post-{i}"));
            assert!(request_ids.insert(body["request_id"].as_str().unwrap().to_string()));
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let (status, body) = send(app(), predict_request("{\"id\": ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["status_code"], 400);
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn post_without_content_is_a_bad_request() {
        let body = json!({"id": "T2", "tweet_type": "REPLY"}).to_string();
        let (status, body) = send(app(), predict_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["status_code"], 400);
    }

    #[tokio::test]
    async fn post_without_id_is_a_bad_request() {
        let body = json!({"text": "hello", "tweet_type": "SINGLE"}).to_string();
        let (status, body) = send(app(), predict_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("id"));
    }

    fn lenient_app() -> Router {
        create_router(state_with(
            Box::new(PriorClassifier::new(vec![0.25, 0.75]).unwrap()),
            FailurePolicy::Strict,
            ValidationMode::Lenient,
            None,
        ))
    }

    #[tokio::test]
    async fn lenient_mode_accepts_an_unknown_kind() {
        let body = json!({"id": "T3", "text": "gm", "tweet_type": "BOGUS"}).to_string();
        let (status, body) = send(lenient_app(), predict_request(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tweet_id"], "T3");
    }

    #[tokio::test]
    async fn lenient_mode_still_requires_content() {
        let body = json!({"id": "T4", "tweet_type": "BOGUS"}).to_string();
        let (status, body) = send(lenient_app(), predict_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no content"));
    }

    #[tokio::test]
    async fn model_failure_is_a_server_error_in_strict_mode() {
        let router = create_router(state_with(
            Box::new(Exploding),
            FailurePolicy::Strict,
            ValidationMode::Strict,
            None,
        ));
        let (status, body) = send(router, predict_request(t1())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["status_code"], 500);
    }

    #[tokio::test]
    async fn model_failure_is_zero_probability_in_degraded_mode() {
        let router = create_router(state_with(
            Box::new(Exploding),
            FailurePolicy::Degraded,
            ValidationMode::Strict,
            None,
        ));
        let (status, body) = send(router, predict_request(t1())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["probability"], 0.0);
        assert_eq!(body["tweet_id"], "T1");
    }

    #[tokio::test]
    async fn slow_prediction_times_out() {
        let router = create_router(state_with(
            Box::new(Slow),
            FailurePolicy::Strict,
            ValidationMode::Strict,
            Some(Duration::from_millis(20)),
        ));
        let (status, body) = send(router, predict_request(t1())).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["status_code"], 504);
    }
}
