pub mod api;
pub mod config;
pub mod error;
pub mod metrics;

pub use api::{create_router, ApiResponse, ApiResponseBody, AppError, AppState, ErrorHandler};
pub use config::{AppConfig, Environment};
pub use error::{ApiError, ApiErrorKind};
pub use metrics::init_metrics;
