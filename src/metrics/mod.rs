use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

// HTTP request metrics
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

// Error pipeline metrics
pub const API_ERRORS_TOTAL: &str = "api_errors_total";

pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .install_recorder()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    counter!(HTTP_REQUESTS_TOTAL, "method" => method.to_string(), "path" => path.to_string(), "status" => status_str.clone())
        .increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method.to_string(), "path" => path.to_string(), "status" => status_str)
        .record(duration.as_secs_f64());
}

pub fn record_api_error(error_name: &str, status: u16) {
    counter!(API_ERRORS_TOTAL, "error" => error_name.to_string(), "status" => status.to_string())
        .increment(1);
}
