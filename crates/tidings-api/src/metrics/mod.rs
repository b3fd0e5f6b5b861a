//! Prometheus metrics for Tidings
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format. Delivery and
//! cache metrics are emitted by `tidings-events`; this module installs the
//! recorder and adds HTTP request metrics.

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tidings_core::{Error, Result};
use tracing::debug;

use crate::server::AppState;

/// Metric names
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "tidings_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "tidings_http_request_duration_seconds";

    pub const UPTIME_SECONDS: &str = "tidings_uptime_seconds";
    pub const INFO: &str = "tidings_info";
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the process-wide Prometheus recorder. Fails if a recorder is
    /// already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| {
                Error::InternalError(format!("failed to install Prometheus recorder: {}", e))
            })?;

        gauge!(names::INFO, "version" => tidings_core::VERSION).set(1.0);

        Ok(Self {
            handle,
            start_time: Instant::now(),
        })
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());
        self.handle.render()
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route template rather than the raw path keeps label cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, "method" => method.clone())
        .record(duration);

    debug!(
        method = %method,
        route = %route,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            metrics.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled\n").into_response(),
    }
}
