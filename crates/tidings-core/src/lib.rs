//! Tidings Core Library
//!
//! Core types, configuration, and the persisted encoding for bucket event
//! notifications.

pub mod codec;
pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::TidingsConfig;
pub use error::{Error, Result};

/// Tidings version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default region stamped into event records
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default `eventSource` of event records
pub const EVENT_SOURCE: &str = "tidings:s3";

/// `eventVersion` of event records
pub const EVENT_VERSION: &str = "2.1";

/// `s3SchemaVersion` of event records
pub const S3_SCHEMA_VERSION: &str = "1.0";
