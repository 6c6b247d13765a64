//! Prepend a cancel-workflow step so a new push cancels in-progress runs.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{get_str, lookup_mut, YamlPath};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

pub const CANCEL_ACTION: &str = "styfle/cancel-workflow-action@0.9.1";

pub static AUTO_CANCEL: RecipeInfo = RecipeInfo {
    name: "auto-cancel-in-progress-workflow",
    display_name: "Cancel in-progress workflow when it is triggered again",
    description: "When a workflow is already running and would be triggered again, cancel the \
                  existing run.",
    options: &[
        "access-token: secret holding the token (default: the workflow's github.token)",
        "job: job to add the step to (default build)",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AutoCancelInProgressWorkflow {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_job")]
    pub job: String,
}

fn default_job() -> String {
    "build".to_string()
}

impl Default for AutoCancelInProgressWorkflow {
    fn default() -> Self {
        Self {
            access_token: None,
            job: default_job(),
        }
    }
}

impl AutoCancelInProgressWorkflow {
    fn token_expression(&self) -> String {
        match self.access_token.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => format!("${{{{ secrets.{} }}}}", secret),
            _ => "${{ github.token }}".to_string(),
        }
    }

    fn cancel_step(&self) -> Value {
        let mut with = Mapping::new();
        with.insert("access_token".into(), self.token_expression().into());
        let mut step = Mapping::new();
        step.insert("uses".into(), CANCEL_ACTION.into());
        step.insert("with".into(), Value::Mapping(with));
        Value::Mapping(step)
    }
}

impl Recipe for AutoCancelInProgressWorkflow {
    fn info(&self) -> &'static RecipeInfo {
        &AUTO_CANCEL
    }

    fn validate(&self) -> Vec<String> {
        if self.job.trim().is_empty() {
            return vec!["job must not be empty".to_string()];
        }
        Vec::new()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Some(steps) =
            lookup_mut(doc, &["jobs", self.job.as_str(), "steps"]).and_then(Value::as_sequence_mut)
        else {
            return;
        };
        // Only jobs that open with an action step are rewritten.
        let Some(first_uses) = steps
            .first()
            .and_then(Value::as_mapping)
            .and_then(|step| get_str(step, "uses"))
        else {
            return;
        };
        if first_uses.contains("cancel-workflow-action") {
            return;
        }
        steps.insert(0, self.cancel_step());
        ctx.edited(
            &YamlPath::root()
                .key("jobs")
                .key(&self.job)
                .key("steps")
                .index(0),
            format!("prepended {}", CANCEL_ACTION),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{assert_rewrites, assert_unchanged, CI};

    const BEFORE: &str = r#"
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
"#;

    #[test]
    fn test_prepends_with_github_token() {
        assert_rewrites(
            &AutoCancelInProgressWorkflow::default(),
            CI,
            BEFORE,
            r#"
jobs:
  build:
    steps:
      - uses: styfle/cancel-workflow-action@0.9.1
        with:
          access_token: ${{ github.token }}
      - uses: actions/checkout@v4
"#,
        );
    }

    #[test]
    fn test_prepends_with_secret() {
        let recipe = AutoCancelInProgressWorkflow {
            access_token: Some("WORKFLOW_TOKEN".to_string()),
            ..Default::default()
        };
        assert_rewrites(
            &recipe,
            CI,
            BEFORE,
            r#"
jobs:
  build:
    steps:
      - uses: styfle/cancel-workflow-action@0.9.1
        with:
          access_token: ${{ secrets.WORKFLOW_TOKEN }}
      - uses: actions/checkout@v4
"#,
        );
    }

    #[test]
    fn test_blank_secret_falls_back() {
        let recipe = AutoCancelInProgressWorkflow {
            access_token: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(recipe.token_expression(), "${{ github.token }}");
    }

    #[test]
    fn test_existing_cancel_step() {
        assert_unchanged(
            &AutoCancelInProgressWorkflow::default(),
            CI,
            "jobs:\n  build:\n    steps:\n      - uses: styfle/cancel-workflow-action@0.12.1\n",
        );
    }

    #[test]
    fn test_empty_or_missing_steps() {
        let recipe = AutoCancelInProgressWorkflow::default();
        assert_unchanged(&recipe, CI, "jobs:\n  build:\n    steps: []\n");
        assert_unchanged(&recipe, CI, "jobs:\n  build:\n    steps: oops\n");
        assert_unchanged(&recipe, CI, "jobs:\n  test:\n    steps:\n      - run: x\n");
    }

    #[test]
    fn test_other_job() {
        let recipe = AutoCancelInProgressWorkflow {
            job: "test".to_string(),
            ..Default::default()
        };
        assert_unchanged(&recipe, CI, "jobs:\n  test:\n    steps:\n      - run: x\n");
        let out = crate::recipes::testing::run(
            &recipe,
            CI,
            "jobs:\n  test:\n    steps:\n      - uses: actions/checkout@v4\n",
        );
        assert_eq!(out.edits[0].location, "$.jobs.test.steps[0]");
    }

    #[test]
    fn test_first_step_without_uses_is_left_alone() {
        assert_unchanged(
            &AutoCancelInProgressWorkflow::default(),
            CI,
            "jobs:\n  build:\n    steps:\n      - run: echo hi\n      - uses: actions/checkout@v4\n",
        );
    }
}
