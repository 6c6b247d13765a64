//! Replace a job's `runs-on` with a list of runner labels.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{lookup_mut, YamlPath};
use serde::Deserialize;
use serde_yaml_ng::Value;

pub static REPLACE_RUNNERS: RecipeInfo = RecipeInfo {
    name: "replace-runners",
    display_name: "Replace runners for a job",
    description: "Replace the runners of a single job with the given list.",
    options: &[
        "job-name: job whose runs-on is replaced, e.g. build",
        "runners: runner labels, e.g. [ubuntu-latest, self-hosted]",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReplaceRunners {
    pub job_name: String,
    pub runners: Vec<String>,
}

impl Recipe for ReplaceRunners {
    fn info(&self) -> &'static RecipeInfo {
        &REPLACE_RUNNERS
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.job_name.trim().is_empty() {
            errors.push("job-name must not be empty".to_string());
        }
        if self.runners.is_empty() {
            errors.push("runners must list at least one runner".to_string());
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Some(slot) = lookup_mut(doc, &["jobs", self.job_name.as_str(), "runs-on"]) else {
            return;
        };
        let replacement = Value::Sequence(
            self.runners
                .iter()
                .map(|r| Value::String(r.clone()))
                .collect(),
        );
        if *slot == replacement {
            return;
        }
        *slot = replacement;
        ctx.edited(
            &YamlPath::root()
                .key("jobs")
                .key(&self.job_name)
                .key("runs-on"),
            format!("runs-on: [{}]", self.runners.join(", ")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{assert_rewrites, assert_unchanged, CI};

    fn recipe(runners: &[&str]) -> ReplaceRunners {
        ReplaceRunners {
            job_name: "build".to_string(),
            runners: runners.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_replace_scalar_runner() {
        assert_rewrites(
            &recipe(&["ubuntu-latest", "self-hosted"]),
            CI,
            "jobs:\n  build:\n    runs-on: windows-latest\n",
            "jobs:\n  build:\n    runs-on: [ubuntu-latest, self-hosted]\n",
        );
    }

    #[test]
    fn test_replace_sequence_runner() {
        assert_rewrites(
            &recipe(&["ubuntu-latest"]),
            CI,
            "jobs:\n  build:\n    runs-on: [macos-latest, windows-latest]\n",
            "jobs:\n  build:\n    runs-on: [ubuntu-latest]\n",
        );
    }

    #[test]
    fn test_missing_job_or_runs_on() {
        assert_unchanged(
            &recipe(&["ubuntu-latest"]),
            CI,
            "jobs:\n  test:\n    runs-on: windows-latest\n",
        );
        assert_unchanged(
            &recipe(&["ubuntu-latest"]),
            CI,
            "jobs:\n  build:\n    steps: []\n",
        );
    }

    #[test]
    fn test_empty_runners_invalid() {
        assert_eq!(recipe(&[]).validate().len(), 1);
    }
}
