//! HTTP client for webhook delivery
//!
//! One POST per attempt. The response is classified into a [`DeliveryError`]
//! so the retry policy can tell transient failures from permanent ones.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tidings_core::config::DispatcherConfig;
use tidings_core::Error;
use tracing::{debug, info_span, warn, Instrument};

use crate::dispatcher::Delivery;
use crate::error::DeliveryError;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(config: &DispatcherConfig) -> tidings_core::Result<Self> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Send one attempt of `delivery`. Returns the 2xx status on success.
    pub async fn send(&self, delivery: &Delivery, attempt: u32) -> Result<u16, DeliveryError> {
        let span = info_span!(
            "webhook_delivery",
            delivery_id = %delivery.id,
            rule_id = %delivery.rule_id,
            bucket = %delivery.bucket_path,
            url = %delivery.url,
            attempt
        );

        async move {
            let started = Instant::now();

            let result = self
                .client
                .post(&delivery.url)
                .headers(delivery.headers.clone())
                .body(delivery.body.clone())
                .send()
                .await;

            let outcome = match result {
                Ok(response) => classify(response.status(), response.headers()),
                Err(e) => Err(self.transport_error(e)),
            };

            let elapsed = started.elapsed();
            match &outcome {
                Ok(status) => {
                    debug!(status, duration_ms = elapsed.as_millis() as u64, "Webhook accepted");
                    metrics::record_attempt("success", elapsed);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        duration_ms = elapsed.as_millis() as u64,
                        "Webhook attempt failed"
                    );
                    metrics::record_attempt(e.kind(), elapsed);
                }
            }

            outcome
        }
        .instrument(span)
        .await
    }

    fn transport_error(&self, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() {
            DeliveryError::Timeout(self.timeout)
        } else if e.is_builder() {
            DeliveryError::InvalidRequest(e.to_string())
        } else if e.is_connect() {
            DeliveryError::Network(format!("connection failed: {}", e))
        } else {
            DeliveryError::Network(e.to_string())
        }
    }
}

fn classify(status: StatusCode, headers: &HeaderMap) -> Result<u16, DeliveryError> {
    let code = status.as_u16();

    if status.is_success() {
        Ok(code)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(DeliveryError::RateLimited {
            retry_after: retry_after(headers),
        })
    } else if status.is_server_error() {
        Err(DeliveryError::ServerError(code))
    } else if status.is_client_error() {
        Err(DeliveryError::ClientError(code))
    } else {
        Err(DeliveryError::UnexpectedStatus(code))
    }
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
