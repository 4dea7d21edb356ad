mod dto;
mod error;
mod handlers;
pub mod middleware;
mod response;
mod routes;

pub use error::{AppError, ErrorOutcome, ForwardedError};
pub use middleware::{ErrorHandler, ErrorHandlerLayer, RequestContext, RequestId};
pub use response::{iso_timestamp, ApiResponse, ApiResponseBody};
pub use routes::{create_router, not_found, AppState};
