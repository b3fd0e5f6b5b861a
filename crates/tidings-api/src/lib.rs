//! Tidings HTTP API
//!
//! Management endpoints for bucket notification configurations, an event
//! intake endpoint standing in for the storage engine hook, health and
//! Prometheus metrics.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use metrics::MetricsRecorder;
pub use server::{router, ApiServer, AppState};
