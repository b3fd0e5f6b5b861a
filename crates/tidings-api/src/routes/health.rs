//! Health check

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::server::AppState;

/// GET /health
///
/// 503 when the store does not answer or the dispatcher stopped accepting.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store = state.manager.store();
    let store_error = match store.ping().await {
        Ok(()) => None,
        Err(e) => {
            warn!("Health check: config store unavailable: {}", e);
            Some(e.to_string())
        }
    };

    let dispatcher = state.manager.dispatcher();
    let stats = dispatcher.stats();
    let healthy = store_error.is_none() && dispatcher.is_accepting();

    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "version": tidings_core::VERSION,
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "store": {
            "backend": store.backend(),
            "error": store_error,
        },
        "cache": {
            "entries": state.manager.cache().len(),
        },
        "dispatcher": {
            "accepting": dispatcher.is_accepting(),
            "scheduled": stats.scheduled,
            "delivered": stats.delivered,
            "failed": stats.failed,
            "dropped": stats.dropped,
            "inFlight": stats.in_flight,
            "queued": stats.queued,
        },
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
