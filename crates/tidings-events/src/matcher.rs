//! Rule matching
//!
//! A rule fires for an event when it is enabled, one of its selectors selects
//! the event type, and the object key passes both key filters. Filters compare
//! bytes exactly (case-sensitive); an absent or empty filter passes every key.

use tidings_core::types::{EventInfo, NotificationConfiguration, NotificationRule};

/// Check if `rule` applies to `event`.
pub fn matches(rule: &NotificationRule, event: &EventInfo) -> bool {
    if !rule.enabled {
        return false;
    }

    if !rule.events.iter().any(|s| s.matches(&event.event_type)) {
        return false;
    }

    key_matches(rule, &event.object_key)
}

fn key_matches(rule: &NotificationRule, key: &str) -> bool {
    if let Some(prefix) = rule.filter_prefix.as_deref() {
        if !key.starts_with(prefix) {
            return false;
        }
    }

    if let Some(suffix) = rule.filter_suffix.as_deref() {
        if !key.ends_with(suffix) {
            return false;
        }
    }

    true
}

/// Every rule of `config` that applies to `event`, in configuration order.
pub fn matching_rules<'a>(
    config: &'a NotificationConfiguration,
    event: &'a EventInfo,
) -> impl Iterator<Item = &'a NotificationRule> + 'a {
    config.rules.iter().filter(move |rule| matches(rule, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::types::event_type::{
        OBJECT_CREATED_ALL, OBJECT_CREATED_COPY, OBJECT_CREATED_PUT, OBJECT_REMOVED_ALL,
        OBJECT_REMOVED_DELETE,
    };

    fn event(event_type: &str, key: &str) -> EventInfo {
        EventInfo::new(Some("tenant-1"), "test-bucket", key, event_type)
    }

    fn rule(events: &[&str]) -> NotificationRule {
        NotificationRule::new("r", "http://example.com/hook", events.iter().copied())
    }

    #[test]
    fn test_wildcard_selector() {
        let rule = rule(&[OBJECT_CREATED_ALL]);
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "a.txt")));
        assert!(matches(&rule, &event(OBJECT_CREATED_COPY, "a.txt")));
        assert!(!matches(&rule, &event(OBJECT_REMOVED_DELETE, "a.txt")));
    }

    #[test]
    fn test_exact_selector() {
        let rule = rule(&[OBJECT_CREATED_PUT]);
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "a.txt")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_COPY, "a.txt")));
    }

    #[test]
    fn test_any_selector_may_match() {
        let rule = rule(&[OBJECT_CREATED_PUT, OBJECT_REMOVED_ALL]);
        assert!(matches(&rule, &event(OBJECT_REMOVED_DELETE, "a.txt")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_COPY, "a.txt")));
    }

    #[test]
    fn test_prefix_filter() {
        let rule = rule(&[OBJECT_CREATED_ALL]).with_prefix("uploads/");
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "uploads/a.txt")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "images/a.txt")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "Uploads/a.txt")));
    }

    #[test]
    fn test_suffix_filter() {
        let rule = rule(&[OBJECT_CREATED_ALL]).with_suffix(".jpg");
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "x.jpg")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "x.png")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "x.JPG")));
    }

    #[test]
    fn test_prefix_and_suffix_both_apply() {
        let rule = rule(&[OBJECT_CREATED_ALL])
            .with_prefix("logs/")
            .with_suffix(".json");
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "logs/app.json")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "data/app.json")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "logs/app.txt")));
    }

    #[test]
    fn test_empty_filters_pass() {
        let rule = rule(&[OBJECT_CREATED_ALL]).with_prefix("").with_suffix("");
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "anything")));
        assert!(matches(&rule, &event(OBJECT_CREATED_PUT, "")));
    }

    #[test]
    fn test_disabled_rule_never_matches() {
        let rule = rule(&[OBJECT_CREATED_ALL, OBJECT_CREATED_PUT]).disabled();
        assert!(!matches(&rule, &event(OBJECT_CREATED_PUT, "a.txt")));
        assert!(!matches(&rule, &event(OBJECT_CREATED_COPY, "")));
    }

    #[test]
    fn test_matching_rules_keeps_order_and_overlaps() {
        let config = NotificationConfiguration::new(Some("tenant-1"), "test-bucket")
            .add_rule(NotificationRule::new("first", "http://a", [OBJECT_CREATED_ALL]))
            .add_rule(NotificationRule::new("removed", "http://b", [OBJECT_REMOVED_ALL]))
            .add_rule(
                NotificationRule::new("second", "http://c", [OBJECT_CREATED_PUT])
                    .with_suffix(".txt"),
            );

        let info = event(OBJECT_CREATED_PUT, "a.txt");
        let ids: Vec<_> = matching_rules(&config, &info).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
