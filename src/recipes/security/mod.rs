//! Security audits for workflows. Every recipe here is search-only: it
//! reports findings and never changes the document.
//!
//! - `injection`: untrusted input reaching shells and scripts
//! - `access`: permissions, triggers, runners and actor checks
//! - `supply_chain`: what a workflow pulls in and how it is pinned
//! - `credentials`: secrets written into files, artifacts or config

pub mod access;
pub mod credentials;
pub mod injection;
pub mod supply_chain;

use serde_yaml_ng::Value;

/// Events that run with write access on behalf of untrusted pull requests.
pub const PRIVILEGED_EVENTS: &[&str] = &["pull_request_target", "workflow_run"];

/// Event names listed under `on`, in document order.
pub fn events(doc: &Value) -> Vec<&str> {
    match doc.get("on") {
        Some(Value::String(event)) => vec![event.as_str()],
        Some(Value::Sequence(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::Mapping(mapping)) => mapping.keys().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// First dangerous event the workflow is triggered by.
pub fn dangerous_trigger(doc: &Value) -> Option<&str> {
    events(doc)
        .into_iter()
        .find(|event| PRIVILEGED_EVENTS.contains(event))
}

/// `true`, `1`, `yes` and `on`, in any case.
pub fn is_truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::parse_documents;

    fn doc(yaml: &str) -> Value {
        parse_documents(yaml).unwrap().remove(0)
    }

    #[test]
    fn test_events_in_every_shape() {
        assert_eq!(events(&doc("on: push\n")), vec!["push"]);
        assert_eq!(events(&doc("on: [push, workflow_run]\n")), vec!["push", "workflow_run"]);
        assert_eq!(
            events(&doc("on:\n  pull_request_target:\n    types: [opened]\n  push:\n")),
            vec!["pull_request_target", "push"]
        );
        assert!(events(&doc("name: x\n")).is_empty());
    }

    #[test]
    fn test_dangerous_trigger() {
        assert_eq!(dangerous_trigger(&doc("on: [push, workflow_run]\n")), Some("workflow_run"));
        assert_eq!(dangerous_trigger(&doc("on: pull_request\n")), None);
    }

    #[test]
    fn test_truthy() {
        assert!(is_truthy("TRUE"));
        assert!(is_truthy(" yes "));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
    }
}
