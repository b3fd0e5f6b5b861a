//! Persisted encoding of notification configurations
//!
//! Stored bytes are a one-byte format version followed by the version's body.
//! Each format version has its own record types, decoupled from the in-memory
//! model, so a change to [`NotificationConfiguration`] never silently changes
//! what is written to the store. Version 1 bodies are JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{EventType, NotificationConfiguration, NotificationRule};

/// Version written by [`encode`].
pub const CURRENT_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredConfigurationV1 {
    bucket_name: String,
    tenant_id: Option<String>,
    rules: Vec<StoredRuleV1>,
    last_updated: DateTime<Utc>,
    last_updated_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRuleV1 {
    id: String,
    enabled: bool,
    webhook_url: String,
    events: Vec<String>,
    filter_prefix: Option<String>,
    filter_suffix: Option<String>,
    custom_headers: BTreeMap<String, String>,
    auth_token: Option<String>,
}

impl From<&NotificationConfiguration> for StoredConfigurationV1 {
    fn from(config: &NotificationConfiguration) -> Self {
        Self {
            bucket_name: config.bucket_name.clone(),
            tenant_id: config.tenant_id.clone(),
            rules: config.rules.iter().map(StoredRuleV1::from).collect(),
            last_updated: config.last_updated,
            last_updated_by: config.last_updated_by.clone(),
        }
    }
}

impl From<&NotificationRule> for StoredRuleV1 {
    fn from(rule: &NotificationRule) -> Self {
        Self {
            id: rule.id.clone(),
            enabled: rule.enabled,
            webhook_url: rule.webhook_url.clone(),
            events: rule.events.iter().map(|e| e.as_str().to_string()).collect(),
            filter_prefix: rule.filter_prefix.clone(),
            filter_suffix: rule.filter_suffix.clone(),
            custom_headers: rule.custom_headers.clone(),
            auth_token: rule.auth_token.clone(),
        }
    }
}

impl From<StoredConfigurationV1> for NotificationConfiguration {
    fn from(stored: StoredConfigurationV1) -> Self {
        Self {
            bucket_name: stored.bucket_name,
            tenant_id: stored.tenant_id,
            rules: stored.rules.into_iter().map(NotificationRule::from).collect(),
            last_updated: stored.last_updated,
            last_updated_by: stored.last_updated_by,
        }
    }
}

impl From<StoredRuleV1> for NotificationRule {
    fn from(stored: StoredRuleV1) -> Self {
        Self {
            id: stored.id,
            enabled: stored.enabled,
            webhook_url: stored.webhook_url,
            events: stored.events.into_iter().map(EventType::from).collect(),
            filter_prefix: stored.filter_prefix,
            filter_suffix: stored.filter_suffix,
            custom_headers: stored.custom_headers,
            auth_token: stored.auth_token,
        }
    }
}

/// Encode a configuration in the current format version.
pub fn encode(config: &NotificationConfiguration) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&StoredConfigurationV1::from(config))
        .map_err(|e| Error::Codec(format!("Failed to encode configuration: {}", e)))?;

    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.push(CURRENT_FORMAT_VERSION);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode bytes written by any supported format version.
pub fn decode(bytes: &[u8]) -> Result<NotificationConfiguration> {
    let (version, body) = bytes
        .split_first()
        .ok_or_else(|| Error::Codec("stored configuration is empty".into()))?;

    match *version {
        1 => {
            let stored: StoredConfigurationV1 = serde_json::from_slice(body)
                .map_err(|e| Error::Codec(format!("Failed to decode configuration: {}", e)))?;
            Ok(stored.into())
        }
        other => Err(Error::Codec(format!(
            "unsupported configuration format version {}",
            other
        ))),
    }
}
