use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use nanoid::nanoid;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::data_models::Record;
use crate::error::Result;
use crate::orchestrator::Orchestrator;

use super::models::{ApiError, HealthResponse};

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        result: "OK".to_string(),
    })
}

/// Returns the serialized result list as a JSON string value.
pub async fn search_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: std::result::Result<Json<Record>, JsonRejection>,
) -> std::result::Result<Json<String>, ApiError> {
    let Json(record) = payload?;
    let results = traced("search", async move { orchestrator.search(&record).await }).await?;
    Ok(Json(results))
}

pub async fn scraping_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: std::result::Result<Json<Record>, JsonRejection>,
) -> std::result::Result<Json<Record>, ApiError> {
    let Json(record) = payload?;
    let record = traced("scraping", orchestrator.scraping(record)).await?;
    Ok(Json(record))
}

pub async fn read_pdf_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: std::result::Result<Json<Record>, JsonRejection>,
) -> std::result::Result<Json<Record>, ApiError> {
    let Json(record) = payload?;
    let record = traced("read_pdf", orchestrator.read_pdf(record)).await?;
    Ok(Json(record))
}

pub async fn analyze_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: std::result::Result<Json<Record>, JsonRejection>,
) -> std::result::Result<Json<Record>, ApiError> {
    let Json(record) = payload?;
    let record = traced("analyze", orchestrator.analyze(record)).await?;
    Ok(Json(record))
}

/// Rejects pipeline requests whose `x-api-key` does not match the configured
/// key. An empty configured key disables the check.
pub async fn require_api_key(
    State(api_key): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    if !api_key.is_empty() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(&*api_key) {
            tracing::warn!(path = %request.uri().path(), "rejected request without valid API key");
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(request).await
}

/// Run one pipeline operation inside a span carrying a fresh request id.
async fn traced<T, F>(operation: &'static str, fut: F) -> std::result::Result<T, ApiError>
where
    F: Future<Output = Result<T>>,
{
    let request_id = nanoid!(10);
    let span = tracing::info_span!("pipeline", operation, %request_id);
    async move {
        let start = Instant::now();
        tracing::info!("started");
        match fut.await {
            Ok(value) => {
                tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "finished");
                Ok(value)
            }
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "failed");
                Err(ApiError::Pipeline(err))
            }
        }
    }
    .instrument(span)
    .await
}
