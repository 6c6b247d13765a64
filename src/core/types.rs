//! Types for the run configuration, recipe output, and plans.
//!
//! The run configuration is a small YAML file listing recipe invocations.
//! Everything else here is produced by the planner and consumed by the
//! executor and the CLI.

use crate::recipes::RecipeSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// ghrewrite.yaml
// ============================================================================

/// Root configuration: which recipes to run, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable name of this recipe list
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Run policy
    #[serde(default)]
    pub policy: Policy,

    /// Recipe invocations, applied in order to every matching file
    #[serde(default)]
    pub recipes: Vec<RecipeSpec>,
}

/// Run policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Treat findings from search recipes as a failure
    #[serde(default)]
    pub fail_on_findings: bool,

    /// Append provenance events to this JSONL file (relative to the root)
    #[serde(default)]
    pub event_log: Option<PathBuf>,
}

// ============================================================================
// Recipe output
// ============================================================================

/// A single in-place rewrite made by a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub recipe: String,
    pub location: String,
    pub detail: String,
}

/// A match reported by a search-only recipe. The document is not changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub recipe: String,
    pub location: String,
    pub message: String,
}

// ============================================================================
// Plan
// ============================================================================

/// What will happen to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Modify,
    NoOp,
    /// The file could not be parsed and was left alone.
    Skip,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modify => write!(f, "MODIFY"),
            Self::NoOp => write!(f, "NO-OP"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Planned outcome for one file.
#[derive(Debug, Clone)]
pub struct FilePlan {
    /// Path relative to the repository root, `/`-separated
    pub path: PathBuf,

    pub action: PlanAction,

    pub edits: Vec<Edit>,

    pub findings: Vec<Finding>,

    /// Text as read from disk; empty when no recipe targets the file
    pub original: String,

    /// Re-rendered text, present only for `Modify`
    pub rendered: Option<String>,
}

/// Full plan for a run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Config name
    pub name: String,

    /// One entry per discovered file, in discovery order
    pub files: Vec<FilePlan>,
}

impl RunPlan {
    pub fn to_modify(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.action == PlanAction::Modify)
            .count()
    }

    pub fn unchanged(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.action == PlanAction::NoOp)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.action == PlanAction::Skip)
            .count()
    }

    pub fn findings(&self) -> impl Iterator<Item = (&PathBuf, &Finding)> {
        self.files
            .iter()
            .flat_map(|f| f.findings.iter().map(move |finding| (&f.path, finding)))
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event appended to the JSONL event log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    RunStarted {
        run_id: String,
        config: String,
        recipes: Vec<String>,
        ghrewrite_version: String,
    },
    FileRewritten {
        run_id: String,
        path: String,
        recipes: Vec<String>,
        edits: usize,
        before_hash: String,
        after_hash: String,
    },
    FindingReported {
        run_id: String,
        path: String,
        recipe: String,
        location: String,
        message: String,
    },
    RunCompleted {
        run_id: String,
        files_rewritten: usize,
        files_unchanged: usize,
        findings: usize,
    },
}

/// Event with timestamp wrapper for JSONL output.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}
