//! Delivery and cache telemetry
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding process installs a recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metric names
pub mod names {
    pub const DELIVERIES_SCHEDULED_TOTAL: &str = "tidings_deliveries_scheduled_total";
    pub const DELIVERIES_TOTAL: &str = "tidings_deliveries_total";
    pub const DELIVERY_ATTEMPTS_TOTAL: &str = "tidings_delivery_attempts_total";
    pub const DELIVERY_DURATION_SECONDS: &str = "tidings_delivery_duration_seconds";
    pub const DELIVERIES_IN_FLIGHT: &str = "tidings_deliveries_in_flight";

    pub const CACHE_HITS_TOTAL: &str = "tidings_config_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "tidings_config_cache_misses_total";
}

/// Terminal (or intermediate, for `Retry`) outcome of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Retry,
    Failed,
    Dropped,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Retry => "retry",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }
}

pub fn record_scheduled() {
    counter!(names::DELIVERIES_SCHEDULED_TOTAL).increment(1);
}

pub fn record_outcome(outcome: DeliveryOutcome) {
    counter!(names::DELIVERIES_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_attempt(result: &'static str, duration: Duration) {
    counter!(names::DELIVERY_ATTEMPTS_TOTAL, "result" => result).increment(1);
    histogram!(names::DELIVERY_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn set_in_flight(count: usize) {
    gauge!(names::DELIVERIES_IN_FLIGHT).set(count as f64);
}
