use std::sync::Arc;

use axum::{
    extract::rejection::{BytesRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::Environment;
use crate::error::{ApiError, ApiErrorKind};

/// Any failure a handler can return. Converting it into a response does not
/// render it; the error rides along in the response extensions until the
/// error-handling layer turns it into an envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Resolved status, message and details for an [`AppError`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorOutcome {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<Vec<Value>>,
}

impl ErrorOutcome {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }
}

/// Response extension carrying a handler failure to the error-handling layer.
#[derive(Clone, Debug)]
pub struct ForwardedError(pub Arc<AppError>);

const GENERIC_MESSAGE: &str = "Something went wrong";

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Unexpected(anyhow::anyhow!(message))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Api(e) => e.name(),
            Self::Database(_) => "DatabaseError",
            Self::Validation(_) => "ValidationError",
            Self::Jwt(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "TokenExpiredError",
                _ => "JsonWebTokenError",
            },
            Self::Unexpected(_) => "Error",
        }
    }

    /// Debug rendering including the cause chain (and a backtrace when one
    /// was captured).
    pub fn stack(&self) -> String {
        match self {
            Self::Unexpected(e) => format!("{e:?}"),
            other => format!("{other:?}"),
        }
    }

    pub fn resolve(&self, environment: Environment) -> ErrorOutcome {
        match self {
            Self::Api(e) => ErrorOutcome {
                status: e.status_code(),
                message: e.message().to_string(),
                errors: e.errors().map(<[Value]>::to_vec),
            },
            Self::Database(e) => resolve_database(e, environment),
            Self::Validation(e) => ErrorOutcome {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: ApiErrorKind::Validation.default_message().to_string(),
                errors: Some(validation_details(e)),
            },
            Self::Jwt(e) => {
                let message = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired",
                    _ => "Invalid token",
                };
                ErrorOutcome::new(StatusCode::UNAUTHORIZED, message)
            }
            Self::Unexpected(e) => {
                if environment.is_production() {
                    return ErrorOutcome::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorKind::Internal.default_message(),
                    );
                }
                let message = e.to_string();
                ErrorOutcome {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: if message.is_empty() {
                        GENERIC_MESSAGE.to_string()
                    } else {
                        message
                    },
                    errors: Some(vec![json!({ "stack": self.stack() })]),
                }
            }
        }
    }
}

fn resolve_database(err: &sqlx::Error, environment: Environment) -> ErrorOutcome {
    // Production never exposes driver text for unclassified database errors.
    let fallback = |message: &str| {
        let message = if environment.is_production() || message.is_empty() {
            ApiErrorKind::Database.default_message()
        } else {
            message
        };
        ErrorOutcome::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    };

    match err {
        sqlx::Error::RowNotFound => ErrorOutcome::new(StatusCode::NOT_FOUND, "Record not found"),
        sqlx::Error::Database(db_err) => match db_err.kind() {
            sqlx::error::ErrorKind::UniqueViolation => {
                let target = db_err
                    .constraint()
                    .or_else(|| db_err.table())
                    .unwrap_or("unknown");
                ErrorOutcome::new(
                    StatusCode::CONFLICT,
                    format!("Unique constraint failed on {}", target),
                )
            }
            sqlx::error::ErrorKind::ForeignKeyViolation => {
                ErrorOutcome::new(StatusCode::BAD_REQUEST, "Foreign key constraint failed")
            }
            _ => fallback(db_err.message()),
        },
        other => fallback(&other.to_string()),
    }
}

/// One `{field, message}` entry per failed rule, ordered by field name.
pub(crate) fn validation_details(errors: &ValidationErrors) -> Vec<Value> {
    let mut details: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let field = field.to_string();
            field_errors
                .iter()
                .map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} failed {} validation", field, e.code));
                    (field.clone(), message)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    details.sort_by(|a, b| a.0.cmp(&b.0));

    details
        .into_iter()
        .map(|(field, message)| json!({ "field": field, "message": message }))
        .collect()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(ForwardedError(Arc::new(self)));
        response
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::Api(ApiError::bad_request(rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Api(ApiError::bad_request(rejection.body_text()))
    }
}
