use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Uniform JSON body returned by every endpoint, success or failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponseBody<T = Value> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl<T: Serialize> ApiResponseBody<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            data,
            errors: None,
            timestamp: iso_timestamp(),
            path: None,
        }
    }
}

impl ApiResponseBody<Value> {
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<Vec<Value>>,
        path: Option<String>,
    ) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            data: None,
            errors,
            timestamp: iso_timestamp(),
            path,
        }
    }
}

/// Writes envelopes as axum responses.
pub struct ApiResponse;

impl ApiResponse {
    pub const DEFAULT_SUCCESS_MESSAGE: &'static str = "Success";
    pub const DEFAULT_ERROR_MESSAGE: &'static str = "Error";
    pub const DEFAULT_CREATED_MESSAGE: &'static str = "Resource created successfully";

    pub fn success<T: Serialize>(
        status: StatusCode,
        message: impl Into<String>,
        data: Option<T>,
    ) -> Response {
        let body = ApiResponseBody::success(status, message, data);
        (status, Json(body)).into_response()
    }

    /// 200 with the default message.
    pub fn ok<T: Serialize>(data: T) -> Response {
        Self::success(StatusCode::OK, Self::DEFAULT_SUCCESS_MESSAGE, Some(data))
    }

    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<Vec<Value>>,
        path: Option<String>,
    ) -> Response {
        let body = ApiResponseBody::error(status, message, errors, path);
        (status, Json(body)).into_response()
    }

    /// 500 with the default message.
    pub fn error_default(path: Option<String>) -> Response {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            Self::DEFAULT_ERROR_MESSAGE,
            None,
            path,
        )
    }

    pub fn created<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Response {
        Self::success(StatusCode::CREATED, message, data)
    }

    pub fn no_content() -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2025-01-31T12:00:00.000Z`.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
