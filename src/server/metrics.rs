//! Prometheus metrics, exposed on their own port.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    core::Collector, CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::{debug, error};

/// Metric name prefix for all server metrics
const PREFIX: &str = "genmusic";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total login attempts"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    pub static ref GENERATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_generations_total"), "Generation requests by input and outcome"),
        &["input", "outcome"]
    ).expect("Failed to create generations_total metric");

    pub static ref GENERATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_generation_duration_seconds"),
            "Generation duration in seconds, synthesis included"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        &["input"]
    ).expect("Failed to create generation_duration_seconds metric");

    pub static ref LIKE_ACTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_like_actions_total"), "Likes and unlikes"),
        &["action"]
    ).expect("Failed to create like_actions_total metric");

    pub static ref CATALOG_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_items_total"), "Rows in the music store"),
        &["type"]
    ).expect("Failed to create catalog_items_total metric");

    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by code"),
        &["error_code"]
    ).expect("Failed to create errors_total metric");
}

/// Registers every collector. Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()),
        Box::new(GENERATIONS_TOTAL.clone()),
        Box::new(GENERATION_DURATION_SECONDS.clone()),
        Box::new(LIKE_ACTIONS_TOTAL.clone()),
        Box::new(CATALOG_ITEMS_TOTAL.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];
    let registered = collectors
        .into_iter()
        .map(|collector| REGISTRY.register(collector))
        .filter(Result::is_ok)
        .count();
    debug!("Registered {} metric collectors", registered);
}

pub fn set_catalog_counts(accounts: usize, entries: usize) {
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["account"])
        .set(accounts as f64);
    CATALOG_ITEMS_TOTAL
        .with_label_values(&["entry"])
        .set(entries as f64);
}

/// Collapses numeric path segments so ids don't explode label cardinality.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = normalize_path(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, &path])
        .observe(duration.as_secs_f64());
}

pub fn record_login_attempt(status: &str) {
    AUTH_LOGIN_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();
}

/// `input` is "text" or "image", `outcome` is "completed" or the error code.
pub fn record_generation(input: &str, outcome: &str, duration: Duration) {
    GENERATIONS_TOTAL.with_label_values(&[input, outcome]).inc();
    GENERATION_DURATION_SECONDS
        .with_label_values(&[input])
        .observe(duration.as_secs_f64());
}

pub fn record_like_action(action: &str) {
    LIKE_ACTIONS_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_error(error_code: &str) {
    ERRORS_TOTAL.with_label_values(&[error_code]).inc();
}

/// Text exposition of the registry, served at `/metrics`.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("Could not encode metrics: {}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
