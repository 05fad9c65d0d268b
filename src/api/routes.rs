use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::{validation::validate, AppState};
use crate::domain::{ModelMetadata, PostRecord, PredictionResult};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    status_code: u16,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
    Timeout,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(message) | ApiError::Internal(message) => message,
            ApiError::Timeout => "prediction timed out".to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                message,
                status_code: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.clone(),
    })
}

pub async fn model_info(State(state): State<AppState>) -> Json<ModelMetadata> {
    Json(state.pipeline.metadata().clone())
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PostRecord>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let started = Instant::now();
    let Json(record) = payload.map_err(|rejection| {
        tracing::warn!(target: "api", error = %rejection.body_text(), "rejected malformed body");
        ApiError::BadRequest(rejection.body_text())
    })?;

    let tweet_id = record.id.clone().unwrap_or_default();
    tracing::info!(target: "api", %tweet_id, "predict request received");

    validate(&record, state.validation).map_err(|err| {
        tracing::warn!(target: "api", %tweet_id, error = %err, "request failed validation");
        ApiError::BadRequest(err.to_string())
    })?;

    let pipeline = state.pipeline.clone();
    let task = tokio::task::spawn_blocking(move || pipeline.predict(&record));
    let joined = match state.request_timeout {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            tracing::error!(
                target: "api",
                %tweet_id,
                timeout_ms = limit.as_millis() as u64,
                "prediction timed out"
            );
            ApiError::Timeout
        })?,
        None => task.await,
    };

    let result = joined
        .map_err(|err| {
            tracing::error!(target: "api", %tweet_id, error = %err, "prediction task panicked");
            ApiError::Internal("prediction task failed".to_string())
        })?
        .map_err(|err| {
            tracing::error!(target: "api", %tweet_id, error = %err, "prediction failed");
            ApiError::Internal(err.to_string())
        })?;

    tracing::info!(
        target: "api",
        request_id = %result.request_id,
        tweet_id = %result.tweet_id,
        probability = result.probability,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "predict response sent"
    );
    Ok(Json(result))
}
