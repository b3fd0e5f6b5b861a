//! API server

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tidings_core::{config::TidingsConfig, Result};
use tidings_events::NotificationManager;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<NotificationManager>,
    pub metrics: Option<Arc<MetricsRecorder>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<NotificationManager>) -> Self {
        Self {
            manager,
            metrics: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/metrics", get(metrics_handler))
        .route("/events", post(routes::publish_event))
        .route(
            "/buckets/{bucket}/notification",
            get(routes::get_bucket_notification)
                .put(routes::put_bucket_notification)
                .delete(routes::delete_bucket_notification),
        )
        .route(
            "/tenants/{tenant}/buckets/{bucket}/notification",
            get(routes::get_tenant_bucket_notification)
                .put(routes::put_tenant_bucket_notification)
                .delete(routes::delete_tenant_bucket_notification),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Management API server
pub struct ApiServer {
    config: TidingsConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: TidingsConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until `shutdown` resolves, then stop accepting connections and
    /// finish in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.server.bind_address, self.config.server.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("Tidings API listening on http://{}", addr);
        if self.state.metrics.is_some() {
            info!("Prometheus metrics at http://{}/metrics", addr);
        }

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Tidings API stopped");
        Ok(())
    }
}
