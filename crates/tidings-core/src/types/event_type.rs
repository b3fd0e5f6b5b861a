//! Event type selectors
//!
//! Event types are colon-delimited strings such as `s3:ObjectCreated:Put`.
//! The text before the last `:` is the *category* and the final segment is the
//! *action*. A selector whose action is `*` is a category wildcard and matches
//! every event type of that category.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action segment that turns a selector into a category wildcard.
pub const WILDCARD_ACTION: &str = "*";

// ============================================================================
// Well-known event types
// ============================================================================

pub const OBJECT_CREATED_ALL: &str = "s3:ObjectCreated:*";
pub const OBJECT_CREATED_PUT: &str = "s3:ObjectCreated:Put";
pub const OBJECT_CREATED_POST: &str = "s3:ObjectCreated:Post";
pub const OBJECT_CREATED_COPY: &str = "s3:ObjectCreated:Copy";
pub const OBJECT_CREATED_COMPLETE_MULTIPART_UPLOAD: &str =
    "s3:ObjectCreated:CompleteMultipartUpload";

pub const OBJECT_REMOVED_ALL: &str = "s3:ObjectRemoved:*";
pub const OBJECT_REMOVED_DELETE: &str = "s3:ObjectRemoved:Delete";
pub const OBJECT_REMOVED_DELETE_MARKER_CREATED: &str = "s3:ObjectRemoved:DeleteMarkerCreated";

pub const OBJECT_RESTORE_ALL: &str = "s3:ObjectRestore:*";
pub const OBJECT_RESTORE_POST: &str = "s3:ObjectRestore:Post";
pub const OBJECT_RESTORE_COMPLETED: &str = "s3:ObjectRestore:Completed";

pub const OBJECT_TAGGING_ALL: &str = "s3:ObjectTagging:*";
pub const OBJECT_TAGGING_PUT: &str = "s3:ObjectTagging:Put";
pub const OBJECT_TAGGING_DELETE: &str = "s3:ObjectTagging:Delete";

pub const OBJECT_ACL_PUT: &str = "s3:ObjectAcl:Put";

pub const REPLICATION_ALL: &str = "s3:Replication:*";
pub const REPLICATION_FAILED: &str = "s3:Replication:OperationFailedReplication";
pub const REPLICATION_MISSED_THRESHOLD: &str = "s3:Replication:OperationMissedThreshold";
pub const REPLICATION_AFTER_THRESHOLD: &str = "s3:Replication:OperationReplicatedAfterThreshold";

pub const LIFECYCLE_EXPIRATION_ALL: &str = "s3:LifecycleExpiration:*";
pub const LIFECYCLE_EXPIRATION_DELETE: &str = "s3:LifecycleExpiration:Delete";
pub const LIFECYCLE_EXPIRATION_DELETE_MARKER_CREATED: &str =
    "s3:LifecycleExpiration:DeleteMarkerCreated";

pub const TEST_EVENT: &str = "s3:TestEvent";

/// An event type or an event-type selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the last `:`; `None` when there is no `:` at all.
    pub fn category(&self) -> Option<&str> {
        self.0.rsplit_once(':').map(|(category, _)| category)
    }

    /// Final colon-delimited segment.
    pub fn action(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(_, action)| action)
            .unwrap_or(&self.0)
    }

    pub fn is_wildcard(&self) -> bool {
        self.category().is_some() && self.action() == WILDCARD_ACTION
    }

    /// A selector is well formed when it has a non-empty category and a
    /// non-empty action.
    pub fn is_well_formed(&self) -> bool {
        matches!(self.category(), Some(c) if !c.is_empty()) && !self.action().is_empty()
    }

    /// Check whether this selector selects `event`.
    ///
    /// Exact equality always matches. A wildcard selector `X:*` additionally
    /// matches any event whose category is exactly `X`.
    pub fn matches(&self, event: &EventType) -> bool {
        if self == event {
            return true;
        }

        if !self.is_wildcard() {
            return false;
        }

        match (self.category(), event.category()) {
            (Some(selector), Some(event)) => selector == event,
            _ => false,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_action() {
        let put = EventType::from(OBJECT_CREATED_PUT);
        assert_eq!(put.category(), Some("s3:ObjectCreated"));
        assert_eq!(put.action(), "Put");
        assert!(!put.is_wildcard());

        let all = EventType::from(OBJECT_CREATED_ALL);
        assert_eq!(all.category(), Some("s3:ObjectCreated"));
        assert!(all.is_wildcard());

        let test = EventType::from(TEST_EVENT);
        assert_eq!(test.category(), Some("s3"));
        assert_eq!(test.action(), "TestEvent");
    }

    #[test]
    fn test_wildcard_matches_same_category() {
        let all = EventType::from(OBJECT_CREATED_ALL);
        assert!(all.matches(&OBJECT_CREATED_PUT.into()));
        assert!(all.matches(&OBJECT_CREATED_COPY.into()));
        assert!(!all.matches(&OBJECT_REMOVED_DELETE.into()));
    }

    #[test]
    fn test_exact_selector_does_not_widen() {
        let put = EventType::from(OBJECT_CREATED_PUT);
        assert!(put.matches(&OBJECT_CREATED_PUT.into()));
        assert!(!put.matches(&OBJECT_CREATED_COPY.into()));
        // Exact selectors never act as wildcards in the reverse direction.
        assert!(!put.matches(&OBJECT_CREATED_ALL.into()));
    }

    #[test]
    fn test_wildcard_does_not_match_nested_categories() {
        let s3_all = EventType::from("s3:*");
        assert!(!s3_all.matches(&OBJECT_CREATED_PUT.into()));
        assert!(s3_all.matches(&TEST_EVENT.into()));
    }

    #[test]
    fn test_well_formed() {
        assert!(EventType::from(OBJECT_CREATED_PUT).is_well_formed());
        assert!(EventType::from(OBJECT_REMOVED_ALL).is_well_formed());
        assert!(!EventType::from("ObjectCreated").is_well_formed());
        assert!(!EventType::from(":Put").is_well_formed());
        assert!(!EventType::from("s3:").is_well_formed());
        assert!(!EventType::from("").is_well_formed());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&EventType::from(OBJECT_CREATED_ALL)).unwrap();
        assert_eq!(json, "\"s3:ObjectCreated:*\"");
    }
}
