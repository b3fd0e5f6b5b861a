//! Delivery errors
//!
//! Never returned to callers of `notify`; they drive retry decisions and end
//! up in logs and metrics.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("webhook returned server error: HTTP {0}")]
    ServerError(u16),

    #[error("webhook rate limited the delivery")]
    RateLimited { retry_after: Option<Duration> },

    #[error("webhook rejected the delivery: HTTP {0}")]
    ClientError(u16),

    #[error("unexpected response status: HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DeliveryError {
    /// Connection errors, timeouts, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Network(_)
                | DeliveryError::Timeout(_)
                | DeliveryError::ServerError(_)
                | DeliveryError::RateLimited { .. }
        )
    }

    /// Delay requested by the endpoint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Network(_) => "network",
            DeliveryError::Timeout(_) => "timeout",
            DeliveryError::ServerError(_) => "server_error",
            DeliveryError::RateLimited { .. } => "rate_limited",
            DeliveryError::ClientError(_) => "client_error",
            DeliveryError::UnexpectedStatus(_) => "unexpected_status",
            DeliveryError::InvalidRequest(_) => "invalid_request",
        }
    }
}
