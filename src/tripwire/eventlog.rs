//! Append-only JSONL provenance event log.

use crate::core::error::{Error, Result};
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use std::io::Write;
use std::path::Path;

/// RFC 3339 UTC timestamp with second precision.
pub fn now_iso8601() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Generate a run ID.
pub fn generate_run_id() -> String {
    format!("r-{}", uuid::Uuid::new_v4().simple())
}

/// Append an event to the log at `path`, creating parent directories.
pub fn append_event(path: &Path, event: ProvenanceEvent) -> Result<()> {
    let fail = |message: String| Error::EventLog {
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| fail(format!("cannot create directory: {}", e)))?;
    }

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te).map_err(|e| fail(format!("JSON serialize error: {}", e)))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| fail(format!("cannot open: {}", e)))?;

    writeln!(file, "{}", json).map_err(|e| fail(format!("write error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_generate_run_id_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("r-"));
        assert_eq!(a.len(), 2 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_append_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/events.jsonl");
        let event = ProvenanceEvent::RunStarted {
            run_id: "r-abc".to_string(),
            config: "modernize-ci".to_string(),
            recipes: vec!["find-missing-timeout".to_string()],
            ghrewrite_version: "0.3.0".to_string(),
        };
        append_event(&path, event).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("run_started"));
        assert!(content.contains("r-abc"));
    }

    #[test]
    fn test_append_multiple() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        for i in 0..3 {
            let event = ProvenanceEvent::FindingReported {
                run_id: "r-1".to_string(),
                path: format!(".github/workflows/w{}.yml", i),
                recipe: "find-missing-timeout".to_string(),
                location: "$.jobs.build".to_string(),
                message: "missing: $.jobs.*.timeout-minutes".to_string(),
            };
            append_event(&path, event).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "finding_reported");
    }

    #[test]
    fn test_append_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be.
        let path = dir.path().join("events.jsonl");
        std::fs::create_dir(&path).unwrap();
        let event = ProvenanceEvent::RunCompleted {
            run_id: "r".to_string(),
            files_rewritten: 0,
            files_unchanged: 0,
            findings: 0,
        };
        assert!(matches!(append_event(&path, event), Err(Error::EventLog { .. })));
    }
}
