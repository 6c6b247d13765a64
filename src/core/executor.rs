//! Executor: orchestration loop for apply.
//!
//! plan → (check / dry-run stop here) → atomic write per modified file →
//! verify hash → provenance events → policy checks

use super::error::{Error, Result};
use super::planner;
use super::types::*;
use crate::recipes::RecipeSpec;
use crate::tripwire::{eventlog, hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Configuration for an apply run.
pub struct ApplyConfig<'a> {
    pub name: &'a str,
    pub recipes: &'a [RecipeSpec],
    pub policy: &'a Policy,
    pub root: &'a Path,
    /// Plan only; never write.
    pub dry_run: bool,
    /// Fail if any file would be rewritten; never write.
    pub check: bool,
}

impl<'a> ApplyConfig<'a> {
    pub fn from_config(config: &'a RewriteConfig, root: &'a Path) -> Self {
        Self {
            name: &config.name,
            recipes: &config.recipes,
            policy: &config.policy,
            root,
            dry_run: false,
            check: false,
        }
    }
}

/// Outcome of an apply run.
#[derive(Debug)]
pub struct ApplyResult {
    pub run_id: String,
    pub plan: RunPlan,
    pub files_rewritten: usize,
    pub total_duration: Duration,
}

/// Execute the apply loop.
pub fn apply(cfg: &ApplyConfig) -> Result<ApplyResult> {
    let start = Instant::now();
    let run_id = eventlog::generate_run_id();
    let plan = planner::plan_recipes(cfg.name, cfg.recipes, cfg.root)?;

    if cfg.check {
        let pending = plan.to_modify();
        if pending > 0 {
            return Err(Error::Pending(pending));
        }
    }

    let mut files_rewritten = 0;
    if !cfg.dry_run && !cfg.check {
        let log = EventSink::new(cfg, &run_id);
        log.emit(ProvenanceEvent::RunStarted {
            run_id: run_id.clone(),
            config: cfg.name.to_string(),
            recipes: cfg.recipes.iter().map(|r| r.name().to_string()).collect(),
            ghrewrite_version: env!("CARGO_PKG_VERSION").to_string(),
        })?;

        for file in &plan.files {
            if let (PlanAction::Modify, Some(rendered)) = (file.action, &file.rendered) {
                rewrite_file(cfg.root, file, rendered, &log)?;
                files_rewritten += 1;
            }
            for finding in &file.findings {
                log.emit(ProvenanceEvent::FindingReported {
                    run_id: run_id.clone(),
                    path: display_path(&file.path),
                    recipe: finding.recipe.clone(),
                    location: finding.location.clone(),
                    message: finding.message.clone(),
                })?;
            }
        }

        log.emit(ProvenanceEvent::RunCompleted {
            run_id: run_id.clone(),
            files_rewritten,
            files_unchanged: plan.unchanged(),
            findings: plan.findings().count(),
        })?;
    }

    let findings = plan.findings().count();
    if cfg.policy.fail_on_findings && findings > 0 {
        return Err(Error::Findings(findings));
    }

    Ok(ApplyResult {
        run_id,
        plan,
        files_rewritten,
        total_duration: start.elapsed(),
    })
}

/// Write one planned file and record it.
fn rewrite_file(root: &Path, file: &FilePlan, rendered: &str, log: &EventSink) -> Result<()> {
    let abs = root.join(&file.path);
    write_atomic(&abs, rendered)?;

    let after_hash = hasher::hash_file(&abs)?;
    let expected = hasher::hash_string(rendered);
    if after_hash != expected {
        return Err(Error::Write {
            path: abs,
            source: std::io::Error::other("content changed during write"),
        });
    }

    tracing::info!(
        file = %file.path.display(),
        edits = file.edits.len(),
        "rewrote"
    );

    let mut recipes: Vec<String> = file.edits.iter().map(|e| e.recipe.clone()).collect();
    recipes.dedup();
    log.emit(ProvenanceEvent::FileRewritten {
        run_id: log.run_id.to_string(),
        path: display_path(&file.path),
        recipes,
        edits: file.edits.len(),
        before_hash: hasher::hash_string(&file.original),
        after_hash,
    })
}

/// Replace `path` with `content` via a temp file in the same directory,
/// keeping the original permissions.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn display_path(path: &Path) -> String {
    super::source::normalize(path)
}

/// Event log writer; a no-op when the policy has no `event_log`.
struct EventSink<'a> {
    path: Option<PathBuf>,
    run_id: &'a str,
}

impl<'a> EventSink<'a> {
    fn new(cfg: &ApplyConfig, run_id: &'a str) -> Self {
        Self {
            path: cfg.policy.event_log.as_ref().map(|p| cfg.root.join(p)),
            run_id,
        }
    }

    fn emit(&self, event: ProvenanceEvent) -> Result<()> {
        match &self.path {
            Some(path) => eventlog::append_event(path, event),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_config;

    const CONFIG: &str = r#"
version: "1.0"
name: modernize
policy:
  event_log: .ghrewrite/events.jsonl
recipes:
  - recipe: setup-java-adopt-openjdk-to-temurin
  - recipe: find-missing-timeout
"#;

    const ADOPT: &str = "# build\njobs:\n  build:\n    steps:\n      - uses: actions/setup-java@v3\n        with:\n          distribution: adopt\n";
    const CLEAN: &str = "# untouched\njobs:\n  lint:\n    timeout-minutes: 5\n    steps:\n      - run: make lint\n";

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let wf = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&wf).unwrap();
        std::fs::write(wf.join("build.yml"), ADOPT).unwrap();
        std::fs::write(wf.join("lint.yml"), CLEAN).unwrap();
        dir
    }

    fn read(dir: &tempfile::TempDir, rel: &str) -> String {
        std::fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn test_apply_rewrites_and_logs() {
        let dir = repo();
        let config = parse_config(CONFIG).unwrap();
        let result = apply(&ApplyConfig::from_config(&config, dir.path())).unwrap();

        assert_eq!(result.files_rewritten, 1);
        assert!(read(&dir, ".github/workflows/build.yml").contains("distribution: temurin"));
        // Unmodified files stay byte-identical, comments included.
        assert_eq!(read(&dir, ".github/workflows/lint.yml"), CLEAN);

        let log = read(&dir, ".ghrewrite/events.jsonl");
        let events: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["run_started", "file_rewritten", "finding_reported", "run_completed"]
        );
        assert_eq!(events[1]["path"], ".github/workflows/build.yml");
        assert_eq!(events[1]["before_hash"], hasher::hash_string(ADOPT));
        assert_eq!(events[3]["files_rewritten"], 1);
    }

    #[test]
    fn test_apply_twice_is_stable() {
        let dir = repo();
        let config = parse_config(CONFIG).unwrap();
        apply(&ApplyConfig::from_config(&config, dir.path())).unwrap();
        let first = read(&dir, ".github/workflows/build.yml");
        let second = apply(&ApplyConfig::from_config(&config, dir.path())).unwrap();
        assert_eq!(second.files_rewritten, 0);
        assert_eq!(read(&dir, ".github/workflows/build.yml"), first);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = repo();
        let config = parse_config(CONFIG).unwrap();
        let mut cfg = ApplyConfig::from_config(&config, dir.path());
        cfg.dry_run = true;
        let result = apply(&cfg).unwrap();
        assert_eq!(result.files_rewritten, 0);
        assert_eq!(result.plan.to_modify(), 1);
        assert_eq!(read(&dir, ".github/workflows/build.yml"), ADOPT);
        assert!(!dir.path().join(".ghrewrite").exists());
    }

    #[test]
    fn test_check_fails_when_pending() {
        let dir = repo();
        let config = parse_config(CONFIG).unwrap();
        let mut cfg = ApplyConfig::from_config(&config, dir.path());
        cfg.check = true;
        assert!(matches!(apply(&cfg), Err(Error::Pending(1))));
        assert_eq!(read(&dir, ".github/workflows/build.yml"), ADOPT);
    }

    #[test]
    fn test_fail_on_findings() {
        let dir = repo();
        let mut config = parse_config(CONFIG).unwrap();
        config.policy.fail_on_findings = true;
        let mut cfg = ApplyConfig::from_config(&config, dir.path());
        cfg.dry_run = true;
        assert!(matches!(apply(&cfg), Err(Error::Findings(1))));
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ci.yml");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ci.yml");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        write_atomic(&path, "new").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
