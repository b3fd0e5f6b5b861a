//! Tidings event notifications
//!
//! Turns completed storage operations into webhook deliveries:
//!
//! ```text
//! storage engine -> NotificationManager::notify -> ConfigCache
//!                -> matcher -> EventBuilder -> Dispatcher -> webhook
//! ```
//!
//! The manager also serves the management operations (get/put/delete of a
//! bucket's notification configuration).

pub mod builder;
pub mod cache;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod metrics;
pub mod retry;

pub use builder::EventBuilder;
pub use cache::{CacheLookup, ConfigCache};
pub use client::WebhookClient;
pub use dispatcher::{Delivery, DispatchStats, Dispatcher};
pub use error::DeliveryError;
pub use manager::NotificationManager;
pub use retry::{RetryDecision, RetryPolicy};
