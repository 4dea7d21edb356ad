use axum::http::{header::CONTENT_TYPE, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReadyData {
    pub environment: String,
}

#[derive(Debug, Serialize)]
pub struct ExampleData {
    pub id: u64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateExampleRequest {
    #[validate(
        required(message = "Name field is required"),
        length(min = 1, message = "Name field is required")
    )]
    pub name: Option<String>,
}

impl CreateExampleRequest {
    /// Parses a JSON body. A request without a JSON content type, or with a
    /// blank body, yields an empty request and is left to validation.
    pub fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, ApiError> {
        if !has_json_content_type(headers) || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        serde_json::from_slice(body).map_err(|e| {
            if e.is_data() {
                ApiError::validation(format!("Invalid request body: {}", e))
            } else {
                ApiError::bad_request(format!("Malformed JSON body: {}", e))
            }
        })
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedExample {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProtectedData {
    pub subject: String,
}

/// Bearer token claims accepted by the protected example.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}
