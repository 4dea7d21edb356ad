use axum::{
    extract::{OriginalUri, State},
    routing::{delete, get, post},
    Router,
};
use jsonwebtoken::DecodingKey;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, Environment};
use crate::error::ApiError;

use super::error::AppError;
use super::handlers;
use super::middleware::{
    forward_panic, request_span, ErrorHandlerLayer, MetricsLayer, RequestIdLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub decoding_key: DecodingKey,
    pub metrics_handle: PrometheusHandle,
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Fallback for every unmatched path, and for a matched path without a
/// handler for the request method.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    ApiError::not_found(format!("Route {} not found", url)).into()
}

pub fn create_router(config: &AppConfig, metrics_handle: PrometheusHandle) -> Router {
    let state = AppState {
        environment: config.environment,
        decoding_key: DecodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
        metrics_handle,
    };

    let example_routes = Router::new()
        .route("/success", get(handlers::get_example))
        .route("/create", post(handlers::create_example))
        .route("/not-found/{id}", get(handlers::get_not_found))
        .route("/error", get(handlers::throw_error))
        .route("/unexpected", get(handlers::throw_unexpected_error))
        .route("/panic", get(handlers::throw_panic))
        .route("/record/{id}", get(handlers::get_record))
        .route("/protected", get(handlers::get_protected))
        .route("/item/{id}", delete(handlers::delete_example))
        .method_not_allowed_fallback(not_found);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/example", example_routes)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CatchPanicLayer::custom(forward_panic))
        .layer(ErrorHandlerLayer::new(config.environment))
        .layer(MetricsLayer)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(RequestIdLayer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
