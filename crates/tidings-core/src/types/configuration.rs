//! Bucket notification configuration
//!
//! One [`NotificationConfiguration`] exists per bucket path. It holds an
//! ordered list of [`NotificationRule`]s, each binding a set of event-type
//! selectors and optional key filters to a webhook target.

use chrono::{DateTime, Utc};
use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::EventType;

/// Prefix of every configuration key written to the config store.
pub const STORE_KEY_PREFIX: &str = "notification/";

/// Separator between tenant id and bucket name. Neither may contain it.
pub const BUCKET_PATH_DELIMITER: char = '/';

// ============================================================================
// Bucket Path
// ============================================================================

/// Cache and store key of a bucket: `tenant/bucket`, or `bucket` when the
/// bucket has no tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketPath(String);

impl BucketPath {
    /// Derive the path, rejecting names that would make it ambiguous.
    ///
    /// An empty tenant id is the same as no tenant.
    pub fn new(tenant_id: Option<&str>, bucket_name: &str) -> Result<Self> {
        validate_bucket_name(bucket_name)?;

        match tenant_id.filter(|t| !t.is_empty()) {
            Some(tenant) => {
                validate_tenant_id(tenant)?;
                Ok(Self(format!(
                    "{}{}{}",
                    tenant, BUCKET_PATH_DELIMITER, bucket_name
                )))
            }
            None => Ok(Self(bucket_name.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the configuration is persisted.
    pub fn store_key(&self) -> String {
        format!("{}{}", STORE_KEY_PREFIX, self.0)
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_bucket_name(bucket_name: &str) -> Result<()> {
    if bucket_name.is_empty() {
        return Err(Error::InvalidBucketName("bucket name is empty".into()));
    }
    if bucket_name.contains(BUCKET_PATH_DELIMITER) {
        return Err(Error::InvalidBucketName(format!(
            "'{}' must not contain '{}'",
            bucket_name, BUCKET_PATH_DELIMITER
        )));
    }
    Ok(())
}

pub fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.contains(BUCKET_PATH_DELIMITER) {
        return Err(Error::InvalidTenantId(format!(
            "'{}' must not contain '{}'",
            tenant_id, BUCKET_PATH_DELIMITER
        )));
    }
    Ok(())
}

// ============================================================================
// Rules
// ============================================================================

fn default_true() -> bool {
    true
}

/// A filter + action binding inside a bucket's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    /// Rule ID, unique within its configuration
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Webhook URL (HTTP/HTTPS)
    #[serde(default)]
    pub webhook_url: String,
    /// Event-type selectors
    pub events: Vec<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_suffix: Option<String>,
    /// Extra headers sent with every delivery
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,
    /// Sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl NotificationRule {
    pub fn new(
        id: impl Into<String>,
        webhook_url: impl Into<String>,
        events: impl IntoIterator<Item = impl Into<EventType>>,
    ) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            webhook_url: webhook_url.into(),
            events: events.into_iter().map(Into::into).collect(),
            filter_prefix: None,
            filter_suffix: None,
            custom_headers: BTreeMap::new(),
            auth_token: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filter_prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filter_suffix = Some(suffix.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate a single rule in isolation.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidConfiguration("rule id is empty".into()));
        }

        if self.events.is_empty() {
            return Err(Error::invalid_rule(&self.id, "no event types selected"));
        }
        for event in &self.events {
            if !event.is_well_formed() {
                return Err(Error::invalid_rule(
                    &self.id,
                    format!("malformed event type '{}'", event),
                ));
            }
        }

        if self.enabled {
            validate_webhook_url(&self.id, &self.webhook_url)?;
        }

        for (name, value) in &self.custom_headers {
            if name.is_empty() {
                return Err(Error::invalid_rule(&self.id, "empty header name"));
            }
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                Error::invalid_rule(&self.id, format!("invalid header name '{}'", name))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                Error::invalid_rule(&self.id, format!("invalid value for header '{}'", name))
            })?;
        }

        if let Some(token) = &self.auth_token {
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::invalid_rule(&self.id, "invalid auth token"))?;
        }

        Ok(())
    }
}

fn validate_webhook_url(rule_id: &str, webhook_url: &str) -> Result<()> {
    if webhook_url.is_empty() {
        return Err(Error::invalid_rule(rule_id, "enabled rule has no webhook URL"));
    }

    let url = url::Url::parse(webhook_url).map_err(|e| {
        Error::invalid_rule(rule_id, format!("invalid webhook URL '{}': {}", webhook_url, e))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::invalid_rule(
            rule_id,
            format!("unsupported webhook URL scheme '{}'", other),
        )),
    }
}

// ============================================================================
// Configuration
// ============================================================================

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Complete bucket notification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfiguration {
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<NotificationRule>,
    #[serde(default = "default_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_updated_by: String,
}

impl NotificationConfiguration {
    pub fn new(tenant_id: Option<&str>, bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            tenant_id: tenant_id.map(str::to_string),
            rules: Vec::new(),
            last_updated: Utc::now(),
            last_updated_by: String::new(),
        }
    }

    pub fn add_rule(mut self, rule: NotificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn updated_by(mut self, principal: impl Into<String>) -> Self {
        self.last_updated_by = principal.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn bucket_path(&self) -> Result<BucketPath> {
        BucketPath::new(self.tenant_id.as_deref(), &self.bucket_name)
    }

    pub fn rule(&self, id: &str) -> Option<&NotificationRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Validate the whole configuration before it is persisted.
    pub fn validate(&self) -> Result<()> {
        self.bucket_path()?;
        self.validate_rules()
    }

    /// Validate the rules alone, for documents whose bucket is supplied
    /// separately (a URL path or a command-line flag).
    pub fn validate_rules(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.rules.len());
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(Error::invalid_rule(&rule.id, "duplicate rule id"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event_type::{OBJECT_CREATED_ALL, OBJECT_REMOVED_ALL};

    fn valid_config() -> NotificationConfiguration {
        NotificationConfiguration::new(Some("tenant-1"), "test-bucket")
            .add_rule(NotificationRule::new(
                "rule-1",
                "http://hooks.example.com/created",
                [OBJECT_CREATED_ALL],
            ))
            .add_rule(NotificationRule::new(
                "rule-2",
                "https://hooks.example.com/removed",
                [OBJECT_REMOVED_ALL],
            ))
    }

    #[test]
    fn test_bucket_path_derivation() {
        let tenant = BucketPath::new(Some("t"), "b").unwrap();
        assert_eq!(tenant.as_str(), "t/b");
        assert_eq!(tenant.store_key(), "notification/t/b");

        let plain = BucketPath::new(None, "b").unwrap();
        assert_eq!(plain.as_str(), "b");
        assert_eq!(BucketPath::new(Some(""), "b").unwrap(), plain);
    }

    #[test]
    fn test_bucket_path_rejects_delimiter() {
        // "t/b" without a tenant would collide with tenant "t" bucket "b".
        assert!(matches!(
            BucketPath::new(None, "t/b"),
            Err(Error::InvalidBucketName(_))
        ));
        assert!(matches!(
            BucketPath::new(Some("a/b"), "c"),
            Err(Error::InvalidTenantId(_))
        ));
        assert!(matches!(
            BucketPath::new(Some("t"), ""),
            Err(Error::InvalidBucketName(_))
        ));
    }

    #[test]
    fn test_valid_configuration() {
        assert!(valid_config().validate().is_ok());
        assert!(NotificationConfiguration::new(None, "empty").validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_rule_id() {
        let config = NotificationConfiguration::new(None, "b").add_rule(NotificationRule::new(
            " ",
            "http://example.com",
            [OBJECT_CREATED_ALL],
        ));
        let err = config.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_rejects_empty_event_set() {
        let config = NotificationConfiguration::new(None, "b").add_rule(NotificationRule::new(
            "r",
            "http://example.com",
            Vec::<EventType>::new(),
        ));
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(msg)) if msg.contains("no event types")
        ));
    }

    #[test]
    fn test_webhook_url_required_only_when_enabled() {
        let enabled = NotificationConfiguration::new(None, "b")
            .add_rule(NotificationRule::new("r", "", [OBJECT_CREATED_ALL]));
        assert!(enabled.validate().is_err());

        let disabled = NotificationConfiguration::new(None, "b")
            .add_rule(NotificationRule::new("r", "", [OBJECT_CREATED_ALL]).disabled());
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_webhook() {
        let config = NotificationConfiguration::new(None, "b").add_rule(NotificationRule::new(
            "r",
            "ftp://example.com/hook",
            [OBJECT_CREATED_ALL],
        ));
        assert!(config.validate().is_err());

        let config = NotificationConfiguration::new(None, "b").add_rule(NotificationRule::new(
            "r",
            "not a url",
            [OBJECT_CREATED_ALL],
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_rule_ids() {
        let config = valid_config().add_rule(NotificationRule::new(
            "rule-1",
            "http://example.com",
            [OBJECT_CREATED_ALL],
        ));
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_rejects_bad_headers() {
        let empty_name = NotificationConfiguration::new(None, "b").add_rule(
            NotificationRule::new("r", "http://example.com", [OBJECT_CREATED_ALL])
                .with_header("", "x"),
        );
        assert!(empty_name.validate().is_err());

        let bad_name = NotificationConfiguration::new(None, "b").add_rule(
            NotificationRule::new("r", "http://example.com", [OBJECT_CREATED_ALL])
                .with_header("X Bad", "x"),
        );
        assert!(bad_name.validate().is_err());

        let bad_value = NotificationConfiguration::new(None, "b").add_rule(
            NotificationRule::new("r", "http://example.com", [OBJECT_CREATED_ALL])
                .with_header("X-Ok", "line\nbreak"),
        );
        assert!(bad_value.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_selector() {
        let config = NotificationConfiguration::new(None, "b").add_rule(NotificationRule::new(
            "r",
            "http://example.com",
            ["ObjectCreated"],
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rules_validate_without_bucket() {
        let mut config = valid_config();
        config.bucket_name.clear();
        config.tenant_id = None;
        assert!(config.validate().is_err());
        assert!(config.validate_rules().is_ok());

        config.rules.push(config.rules[0].clone());
        assert!(config.validate_rules().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "bucketName": "photos",
            "rules": [
                {"id": "r1", "webhookUrl": "http://example.com", "events": ["s3:ObjectCreated:*"]}
            ]
        }"#;
        let config: NotificationConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.bucket_name, "photos");
        assert!(config.tenant_id.is_none());
        assert!(config.rules[0].enabled);
        assert!(config.rules[0].custom_headers.is_empty());
        assert!(config.validate().is_ok());
    }
}
