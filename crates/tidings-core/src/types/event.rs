//! Event trigger input and the webhook wire envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{BucketPath, EventType};

// ============================================================================
// Trigger Input
// ============================================================================

/// Minimal description of a completed storage operation, handed over by the
/// storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub bucket_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub object_key: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub event_type: EventType,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub source_ip: String,
}

impl EventInfo {
    pub fn new(
        tenant_id: Option<&str>,
        bucket_name: impl Into<String>,
        object_key: impl Into<String>,
        event_type: impl Into<EventType>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            tenant_id: tenant_id.map(str::to_string),
            object_key: object_key.into(),
            size: 0,
            checksum: String::new(),
            version_id: None,
            event_type: event_type.into(),
            user_id: String::new(),
            request_id: String::new(),
            source_ip: String::new(),
        }
    }

    pub fn bucket_path(&self) -> Result<BucketPath> {
        BucketPath::new(self.tenant_id.as_deref(), &self.bucket_name)
    }
}

// ============================================================================
// Event Record (S3 Event Message Format)
// ============================================================================

/// One event record as delivered to a webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    /// RFC 3339, UTC
    pub event_time: DateTime<Utc>,
    pub event_name: String,
    pub user_identity: UserIdentity,
    pub request_parameters: RequestParameters,
    pub response_elements: ResponseElements,
    pub s3: S3Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub principal_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseElements {
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Info {
    pub s3_schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
    pub bucket: S3BucketInfo,
    pub object: S3ObjectInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3BucketInfo {
    pub name: String,
    pub owner_identity: UserIdentity,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ObjectInfo {
    pub key: String,
    pub size: i64,
    pub e_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub sequencer: String,
}

/// Body of a webhook POST
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookPayload {
    pub records: Vec<Event>,
}

impl WebhookPayload {
    pub fn single(event: Event) -> Self {
        Self {
            records: vec![event],
        }
    }
}
