//! Source-path conventions and file discovery.
//!
//! Paths are always repository-relative and `/`-separated before matching,
//! so the same globs work on every platform.

use super::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

pub const WORKFLOW_GLOBS: &[&str] = &[".github/workflows/*.yml", ".github/workflows/*.yaml"];
pub const DEPENDABOT_GLOBS: &[&str] = &[".github/dependabot.yml", ".github/dependabot.yaml"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Render a relative path with `/` separators.
pub fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True if `path` matches the glob. Invalid globs never match.
pub fn matches_glob(path: &Path, glob: &str) -> bool {
    Pattern::new(glob)
        .map(|p| p.matches_with(&normalize(path), MATCH_OPTIONS))
        .unwrap_or(false)
}

pub fn matches_any(path: &Path, globs: &[&str]) -> bool {
    globs.iter().any(|g| matches_glob(path, g))
}

/// A GitHub Actions workflow file.
pub fn is_workflow(path: &Path) -> bool {
    matches_any(path, WORKFLOW_GLOBS)
}

/// The Dependabot configuration file.
pub fn is_dependabot(path: &Path) -> bool {
    matches_any(path, DEPENDABOT_GLOBS)
}

/// Workflow file whose file name matches `name_glob`. An empty glob matches
/// every workflow.
pub fn is_workflow_named(path: &Path, name_glob: Option<&str>) -> bool {
    if !is_workflow(path) {
        return false;
    }
    match name_glob.map(str::trim).filter(|g| !g.is_empty()) {
        None => true,
        Some(glob) => path
            .file_name()
            .map(|name| matches_glob(Path::new(name), glob))
            .unwrap_or(false),
    }
}

/// Check that a user-supplied glob compiles.
pub fn validate_glob(glob: &str) -> std::result::Result<(), String> {
    Pattern::new(glob)
        .map(|_| ())
        .map_err(|e| format!("invalid glob '{}': {}", glob, e))
}

/// Find every YAML file under `<root>/.github`, sorted, as relative paths.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let github = root.join(".github");
    if !github.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(&github).sort_by_file_name() {
        let entry = entry.map_err(|source| Error::Walk {
            root: github.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            found.push(rel.to_path_buf());
        }
    }
    Ok(found)
}
