use std::fmt;

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Category of a recognized API error. Fixes the HTTP status, the
/// operational flag and the message used when the caller supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    Database,
    Internal,
}

impl ApiErrorKind {
    pub const ALL: [ApiErrorKind; 8] = [
        Self::BadRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::Conflict,
        Self::Validation,
        Self::Database,
        Self::Internal,
    ];

    pub fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operational errors are expected client or business faults. Database
    /// and internal failures are not.
    pub fn is_operational(self) -> bool {
        !matches!(self, Self::Database | Self::Internal)
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden - You do not have permission to access this resource",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Conflict - Resource already exists",
            Self::Validation => "Validation failed",
            Self::Database => "Database operation failed",
            Self::Internal => "Internal Server Error",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequestError",
            Self::Unauthorized => "UnauthorizedError",
            Self::Forbidden => "ForbiddenError",
            Self::NotFound => "NotFoundError",
            Self::Conflict => "ConflictError",
            Self::Validation => "ValidationError",
            Self::Database => "DatabaseError",
            Self::Internal => "InternalServerError",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    errors: Option<Vec<Value>>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind) -> Self {
        Self::with_message(kind, kind.default_message())
    }

    pub fn with_message(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
        }
    }

    /// Attaches structured detail entries, e.g. `{"field": .., "message": ..}`.
    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Validation, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Database, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ApiErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    pub fn is_operational(&self) -> bool {
        self.kind.is_operational()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> Option<&[Value]> {
        self.errors.as_deref()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl From<ApiErrorKind> for ApiError {
    fn from(kind: ApiErrorKind) -> Self {
        Self::new(kind)
    }
}
