//! Error types for Tidings

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Validation Errors
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("Invalid notification configuration: {0}")]
    InvalidConfiguration(String),

    // Store Errors
    #[error("Configuration store error: {0}")]
    Store(String),

    #[error("Configuration encoding error: {0}")]
    Codec(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidBucketName(_) => "InvalidBucketName",
            Error::InvalidTenantId(_) => "InvalidTenantId",
            Error::InvalidConfiguration(_) => "InvalidNotificationConfiguration",
            Error::Store(_) => "StoreError",
            Error::Codec(_) => "CorruptConfiguration",
            Error::Timeout(_) => "Timeout",
            Error::InternalError(_) | Error::Io(_) | Error::Other(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidBucketName(_)
            | Error::InvalidTenantId(_)
            | Error::InvalidConfiguration(_) => 400,

            Error::Timeout(_) => 504,

            _ => 500,
        }
    }

    /// True for errors caused by the caller's input rather than by I/O.
    pub fn is_validation(&self) -> bool {
        self.http_status() == 400
    }

    pub(crate) fn invalid_rule(rule_id: &str, reason: impl std::fmt::Display) -> Self {
        Error::InvalidConfiguration(format!("rule '{}': {}", rule_id, reason))
    }
}
