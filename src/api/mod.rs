use axum::http::HeaderValue;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiSettings;
use crate::orchestrator::Orchestrator;

pub mod handlers;
pub mod models;

pub fn create_router(orchestrator: Arc<Orchestrator>, api: &ApiSettings) -> Router {
    let api_key: Arc<str> = Arc::from(api.api_key.as_str());

    let pipeline = Router::new()
        .route("/search", post(handlers::search_handler))
        .route("/scraping", post(handlers::scraping_handler))
        .route("/read_pdf", post(handlers::read_pdf_handler))
        .route("/analyze", post(handlers::analyze_handler))
        .route_layer(middleware::from_fn_with_state(
            api_key,
            handlers::require_api_key,
        ))
        .with_state(orchestrator);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(pipeline)
        .layer(cors_layer(&api.origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
