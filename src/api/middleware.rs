use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, OriginalUri, Request},
    http::header::HeaderValue,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::{error, info_span, warn, Span};
use uuid::Uuid;

use crate::config::Environment;
use crate::metrics;

use super::error::{AppError, ForwardedError};
use super::response::{iso_timestamp, ApiResponse};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| RequestId(s.to_string()))
            .unwrap_or_else(RequestId::new);

        req.extensions_mut().insert(request_id.clone());

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response.headers_mut().insert(
                REQUEST_ID_HEADER,
                HeaderValue::from_str(&request_id.0).unwrap_or_else(|_| HeaderValue::from_static("unknown")),
            );
            Ok(response)
        })
    }
}

/// Span for `TraceLayer`, tagged with the id set by [`RequestIdLayer`].
pub fn request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("unknown");

    info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = %request_id,
    )
}

#[derive(Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for MetricsMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        // Unmatched paths share one label.
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "<unmatched>".to_string());

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            let duration = start.elapsed();
            let status = response.status().as_u16();

            metrics::record_http_request(&method, &path, status, duration);

            Ok(response)
        })
    }
}

/// Request facts reported alongside a failure.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub path: String,
    pub method: String,
    pub request_id: Option<String>,
}

/// Terminal stage of the pipeline: turns a forwarded [`AppError`] into the
/// error envelope. The environment decides whether internal detail is shown.
#[derive(Clone, Copy, Debug)]
pub struct ErrorHandler {
    environment: Environment,
}

impl ErrorHandler {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn render(&self, err: &AppError, ctx: &RequestContext) -> Response {
        let outcome = err.resolve(self.environment);
        let stack = (!self.environment.is_production()).then(|| err.stack());
        let timestamp = iso_timestamp();

        if outcome.status.is_server_error() {
            error!(
                name = err.name(),
                message = %err,
                stack = stack.as_deref(),
                path = %ctx.path,
                method = %ctx.method,
                request_id = ctx.request_id.as_deref(),
                timestamp = %timestamp,
                status = outcome.status.as_u16(),
                "Request failed"
            );
        } else {
            warn!(
                name = err.name(),
                message = %err,
                stack = stack.as_deref(),
                path = %ctx.path,
                method = %ctx.method,
                request_id = ctx.request_id.as_deref(),
                timestamp = %timestamp,
                status = outcome.status.as_u16(),
                "Request rejected"
            );
        }

        metrics::record_api_error(err.name(), outcome.status.as_u16());

        ApiResponse::error(
            outcome.status,
            outcome.message,
            outcome.errors,
            Some(ctx.path.clone()),
        )
    }
}

#[derive(Clone)]
pub struct ErrorHandlerLayer {
    handler: ErrorHandler,
}

impl ErrorHandlerLayer {
    pub fn new(environment: Environment) -> Self {
        Self {
            handler: ErrorHandler::new(environment),
        }
    }
}

impl<S> Layer<S> for ErrorHandlerLayer {
    type Service = ErrorHandlerMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandlerMiddleware {
            inner,
            handler: self.handler,
        }
    }
}

#[derive(Clone)]
pub struct ErrorHandlerMiddleware<S> {
    inner: S,
    handler: ErrorHandler,
}

impl<S> Service<Request<Body>> for ErrorHandlerMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Nested routers see a stripped URI; report the one the client sent.
        let path = req
            .extensions()
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let ctx = RequestContext {
            path,
            method: req.method().to_string(),
            request_id: req.extensions().get::<RequestId>().map(|id| id.0.clone()),
        };
        let handler = self.handler;

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            match response.extensions_mut().remove::<ForwardedError>() {
                Some(ForwardedError(err)) => Ok(handler.render(&err, &ctx)),
                None => Ok(response),
            }
        })
    }
}

/// Converts a handler panic into an unexpected error for [`ErrorHandler`].
pub fn forward_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::unexpected(format!("Handler panicked: {}", detail)).into_response()
}
