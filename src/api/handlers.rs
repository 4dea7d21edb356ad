use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, Validation};
use tracing::debug;
use validator::Validate;

use crate::error::ApiError;

use super::dto::{
    Claims, CreateExampleRequest, CreatedExample, ExampleData, HealthResponse, ProtectedData,
    ReadyData,
};
use super::error::{validation_details, AppError};
use super::response::ApiResponse;
use super::routes::AppState;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
    })
}

pub async fn ready_check(State(state): State<AppState>) -> Response {
    ApiResponse::success(
        StatusCode::OK,
        "Service is ready",
        Some(ReadyData {
            environment: state.environment.to_string(),
        }),
    )
}

pub async fn get_example() -> Response {
    let data = ExampleData {
        id: 1,
        name: "Example Data".to_string(),
        description: "This is an example of a successful response".to_string(),
    };

    ApiResponse::success(StatusCode::OK, "Data retrieved successfully", Some(data))
}

pub async fn create_example(
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let payload = CreateExampleRequest::from_body(&headers, &body?)?;
    payload.validate().map_err(|e| {
        ApiError::validation("Name is required").with_errors(validation_details(&e))
    })?;

    let now = Utc::now();
    let created = CreatedExample {
        id: now.timestamp_millis(),
        name: payload.name.unwrap_or_default(),
        created_at: now,
    };
    debug!(id = created.id, name = %created.name, "Example resource created");

    Ok(ApiResponse::created(
        ApiResponse::DEFAULT_CREATED_MESSAGE,
        Some(created),
    ))
}

pub async fn get_not_found(Path(id): Path<String>) -> Result<Response, AppError> {
    Err(ApiError::not_found(format!("Resource with id {} not found", id)).into())
}

pub async fn throw_error() -> Result<Response, AppError> {
    Err(ApiError::bad_request("This is a bad request error example").into())
}

pub async fn throw_unexpected_error() -> Result<Response, AppError> {
    Err(AppError::unexpected("This is an unexpected error"))
}

pub async fn throw_panic() -> Response {
    panic!("This is a panicking handler");
}

/// Simulates a lookup that finds no row.
pub async fn get_record(
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    debug!(id, "Looking up example record");
    Err(sqlx::Error::RowNotFound.into())
}

pub async fn get_protected(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let token_data = decode::<Claims>(
        token,
        &state.decoding_key,
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Token accepted",
        Some(ProtectedData {
            subject: token_data.claims.sub,
        }),
    ))
}

pub async fn delete_example(
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    debug!(id, "Example resource deleted");
    Ok(ApiResponse::no_content())
}
