//! Who a workflow runs as, when, and where.

use super::dangerous_trigger;
use crate::core::document::{for_each_entry, for_each_job_mut, YamlPath};
use crate::recipes::{Recipe, RecipeInfo, VisitContext};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::sync::LazyLock;

// ============================================================================
// excessive-permissions
// ============================================================================

pub static EXCESSIVE_PERMISSIONS: RecipeInfo = RecipeInfo {
    name: "excessive-permissions",
    display_name: "Find excessive permissions",
    description: "Report `permissions` blocks that grant `write-all`, `read-all`, or write \
                  access to sensitive scopes.",
    options: &[],
};

const HIGH_RISK_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "contents",
    "deployments",
    "id-token",
    "issues",
    "packages",
    "pages",
    "pull-requests",
];

const MEDIUM_RISK_SCOPES: &[&str] = &[
    "checks",
    "discussions",
    "repository-projects",
    "security-events",
];

fn write_grants(permissions: &Mapping) -> Vec<String> {
    permissions
        .iter()
        .filter(|(_, level)| level.as_str() == Some("write"))
        .filter_map(|(scope, _)| {
            let scope = scope.as_str()?;
            if HIGH_RISK_SCOPES.contains(&scope) {
                Some(format!("{}: write (high risk)", scope))
            } else if MEDIUM_RISK_SCOPES.contains(&scope) {
                Some(format!("{}: write (medium risk)", scope))
            } else {
                None
            }
        })
        .collect()
}

fn permissions_problem(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s == "write-all" => Some(
            "Uses 'write-all' permissions which grants excessive access. Consider using \
             specific permissions instead."
                .to_string(),
        ),
        Value::String(s) if s == "read-all" => Some(
            "Uses 'read-all' permissions. Consider using specific permissions if only certain \
             resources need to be accessed."
                .to_string(),
        ),
        Value::Mapping(permissions) => {
            let grants = write_grants(permissions);
            if grants.is_empty() {
                return None;
            }
            Some(format!(
                "Contains potentially excessive write permissions: {}. Consider whether these \
                 permissions are necessary and if they can be scoped more narrowly.",
                grants.join(", ")
            ))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcessivePermissions {}

impl Recipe for ExcessivePermissions {
    fn info(&self) -> &'static RecipeInfo {
        &EXCESSIVE_PERMISSIONS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            if key != "permissions" {
                return;
            }
            if let Some(message) = permissions_problem(value) {
                ctx.found(path, message);
            }
        });
    }
}

// ============================================================================
// dangerous-triggers
// ============================================================================

pub static DANGEROUS_TRIGGERS: RecipeInfo = RecipeInfo {
    name: "dangerous-triggers",
    display_name: "Find dangerous workflow triggers",
    description: "Report workflows triggered by `pull_request_target` or `workflow_run`, which \
                  run privileged in the context of the target repository.",
    options: &[],
};

fn trigger_message(event: &str) -> &'static str {
    if event == "pull_request_target" {
        "The 'pull_request_target' trigger is almost always used insecurely. It runs with write \
         permissions in the context of the target repository, potentially allowing code \
         injection from pull requests. Consider using 'pull_request' instead, or implement \
         proper isolation."
    } else {
        "The 'workflow_run' trigger is almost always used insecurely. It can trigger workflows \
         with sensitive permissions based on external events. Consider using more specific \
         triggers with explicit safety checks."
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DangerousTriggers {}

impl Recipe for DangerousTriggers {
    fn info(&self) -> &'static RecipeInfo {
        &DANGEROUS_TRIGGERS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        if let Some(event) = dangerous_trigger(doc) {
            ctx.found(&YamlPath::root().key("on"), trigger_message(event));
        }
    }
}

// ============================================================================
// secrets-inherit
// ============================================================================

pub static SECRETS_INHERIT: RecipeInfo = RecipeInfo {
    name: "secrets-inherit",
    display_name: "Find unconditional secrets inheritance",
    description: "Report reusable workflow calls that pass every parent secret with \
                  `secrets: inherit`.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretsInherit {}

impl Recipe for SecretsInherit {
    fn info(&self) -> &'static RecipeInfo {
        &SECRETS_INHERIT
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            if key == "secrets" && value.as_str() == Some("inherit") {
                ctx.found(
                    path,
                    "This reusable workflow unconditionally inherits all parent secrets. \
                     Consider explicitly passing only the required secrets to follow the \
                     principle of least privilege and reduce the risk of secret exposure to \
                     called workflows.",
                );
            }
        });
    }
}

// ============================================================================
// self-hosted-runner
// ============================================================================

pub static SELF_HOSTED_RUNNER: RecipeInfo = RecipeInfo {
    name: "self-hosted-runner",
    display_name: "Find usage of self-hosted runners",
    description: "Report jobs that run on `self-hosted` runners, directly or through a matrix.",
    options: &[],
};

const SELF_HOSTED: &str = "self-hosted";

const SELF_HOSTED_MESSAGE: &str = "Uses self-hosted runner which may have security implications \
                                   in public repositories. Ensure runners are ephemeral and \
                                   properly isolated.";

/// True when a matrix dimension lists `self-hosted`.
fn matrix_has_self_hosted(job: &Mapping) -> bool {
    let Some(Value::Mapping(matrix)) = job.get("strategy").and_then(|s| s.get("matrix")) else {
        return false;
    };
    matrix.values().any(|dimension| {
        dimension
            .as_sequence()
            .is_some_and(|values| values.iter().any(|v| v.as_str() == Some(SELF_HOSTED)))
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelfHostedRunner {}

impl Recipe for SelfHostedRunner {
    fn info(&self) -> &'static RecipeInfo {
        &SELF_HOSTED_RUNNER
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_job_mut(doc, &mut |_, path, job| {
            let message = match job.get("runs-on") {
                Some(Value::String(label)) if label == SELF_HOSTED => SELF_HOSTED_MESSAGE,
                Some(Value::String(expr))
                    if expr.contains("${{")
                        && expr.contains("matrix.")
                        && matrix_has_self_hosted(job) =>
                {
                    "Expression may expand to self-hosted runner. Verify that self-hosted \
                     runners are properly secured."
                }
                Some(Value::Sequence(labels))
                    if labels.first().and_then(Value::as_str) == Some(SELF_HOSTED) =>
                {
                    SELF_HOSTED_MESSAGE
                }
                _ => return,
            };
            ctx.found(&path.key("runs-on"), message);
        });
    }
}

// ============================================================================
// bot-conditions
// ============================================================================

pub static BOT_CONDITIONS: RecipeInfo = RecipeInfo {
    name: "bot-conditions",
    display_name: "Find spoofable bot actor checks",
    description: "Report `if:` conditions that trust a bot by actor name or by `contains`, \
                  both of which an attacker account can imitate.",
    options: &[],
};

/// Actor ids of dependabot, dependabot-preview and renovate.
const KNOWN_BOT_ACTOR_IDS: &[&str] = &["29110", "49699333", "27856297", "29139614"];

static SPOOFABLE_ACTOR_NAME: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"github\.actor\s*==\s*['"][^'"]*\[bot\]['"]"#,
        r#"github\.triggering_actor\s*==\s*['"][^'"]*\[bot\]['"]"#,
        r#"github\.event\.pull_request\.sender\.login\s*==\s*['"][^'"]*\[bot\]['"]"#,
        r#"github\.actor\s*==\s*['"][^'"]*bot[^'"]*['"]"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("actor name regex is valid"))
    .collect()
});

static CONTAINS_BOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"contains\s*\(\s*github\.[^,]+,\s*['"]bot['"]\s*\)"#)
        .expect("contains bot regex is valid")
});

static ACTOR_ID_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"github\.(actor_id|event\.pull_request\.sender\.id)\s*==\s*['"]\d+['"]"#)
        .expect("actor id regex is valid")
});

fn bot_condition_problem(condition: &str) -> Option<&'static str> {
    if SPOOFABLE_ACTOR_NAME.iter().any(|re| re.is_match(condition)) {
        return Some(
            "Bot actor name check is spoofable. Consider using actor_id instead for more \
             secure bot validation.",
        );
    }
    if CONTAINS_BOT.is_match(condition) {
        return Some(
            "Bot actor check using contains() is unreliable and spoofable. Use exact actor_id \
             comparison instead.",
        );
    }
    let quoted_bot_id = KNOWN_BOT_ACTOR_IDS.iter().any(|id| {
        condition.contains(&format!("'{}'", id)) || condition.contains(&format!("\"{}\"", id))
    });
    if ACTOR_ID_STRING.is_match(condition) && quoted_bot_id {
        return Some(
            "Using string comparison for actor_id. Consider using numeric comparison for better \
             reliability.",
        );
    }
    None
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConditions {}

impl Recipe for BotConditions {
    fn info(&self) -> &'static RecipeInfo {
        &BOT_CONDITIONS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            if key != "if" {
                return;
            }
            if let Some(message) = value.as_str().and_then(bot_condition_problem) {
                ctx.found(path, message);
            }
        });
    }
}

// ============================================================================
// anonymous-jobs
// ============================================================================

pub static ANONYMOUS_JOBS: RecipeInfo = RecipeInfo {
    name: "anonymous-jobs",
    display_name: "Find jobs without descriptive names",
    description: "Report jobs with no `name`; reusable workflow calls are exempt.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymousJobs {}

impl Recipe for AnonymousJobs {
    fn info(&self) -> &'static RecipeInfo {
        &ANONYMOUS_JOBS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_job_mut(doc, &mut |_, path, job| {
            if !job.contains_key("name") && !job.contains_key("uses") {
                ctx.found(
                    path,
                    "Job has no name. Add a descriptive name to make it easier to identify in \
                     workflow runs.",
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{run, CI};

    fn locations(out: &crate::recipes::testing::Outcome) -> Vec<&str> {
        out.findings.iter().map(|f| f.location.as_str()).collect()
    }

    #[test]
    fn test_excessive_permissions() {
        let yaml = r#"
permissions: write-all
jobs:
  release:
    permissions:
      contents: write
      checks: write
      statuses: write
      pull-requests: read
  docs:
    permissions: read-all
  lint:
    permissions:
      contents: read
"#;
        let out = run(&ExcessivePermissions {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.permissions",
                "$.jobs.release.permissions",
                "$.jobs.docs.permissions"
            ]
        );
        assert!(out.findings[0].message.starts_with("Uses 'write-all'"));
        assert!(out.findings[1]
            .message
            .contains("contents: write (high risk), checks: write (medium risk)."));
        assert!(out.findings[2].message.starts_with("Uses 'read-all'"));
    }

    #[test]
    fn test_dangerous_triggers() {
        let out = run(
            &DangerousTriggers {},
            CI,
            "on:\n  push:\n  pull_request_target:\n    types: [opened]\njobs: {}\n",
        );
        assert_eq!(locations(&out), vec!["$.on"]);
        assert!(out.findings[0].message.starts_with("The 'pull_request_target' trigger"));

        let out = run(&DangerousTriggers {}, CI, "on: [workflow_run]\n");
        assert!(out.findings[0].message.starts_with("The 'workflow_run' trigger"));

        assert!(run(&DangerousTriggers {}, CI, "on: [push, pull_request]\n")
            .findings
            .is_empty());
    }

    #[test]
    fn test_secrets_inherit() {
        let yaml = r#"
jobs:
  call:
    uses: org/repo/.github/workflows/deploy.yml@v1
    secrets: inherit
  explicit:
    uses: org/repo/.github/workflows/deploy.yml@v1
    secrets:
      token: ${{ secrets.TOKEN }}
"#;
        let out = run(&SecretsInherit {}, CI, yaml);
        assert_eq!(locations(&out), vec!["$.jobs.call.secrets"]);
    }

    #[test]
    fn test_self_hosted_runner() {
        let yaml = r#"
jobs:
  plain:
    runs-on: self-hosted
  labels:
    runs-on: [self-hosted, linux, x64]
  matrix:
    strategy:
      matrix:
        runner: [ubuntu-latest, self-hosted]
    runs-on: ${{ matrix.runner }}
  hosted:
    runs-on: ubuntu-latest
  hosted-matrix:
    strategy:
      matrix:
        os: [ubuntu-latest, windows-latest]
    runs-on: ${{ matrix.os }}
"#;
        let out = run(&SelfHostedRunner {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.jobs.plain.runs-on",
                "$.jobs.labels.runs-on",
                "$.jobs.matrix.runs-on"
            ]
        );
        assert_eq!(out.findings[0].message, SELF_HOSTED_MESSAGE);
        assert!(out.findings[2].message.starts_with("Expression may expand"));
    }

    #[test]
    fn test_bot_condition_problems() {
        assert!(bot_condition_problem("github.actor == 'dependabot[bot]'")
            .is_some_and(|m| m.starts_with("Bot actor name check")));
        assert!(bot_condition_problem("contains(github.actor, 'bot')")
            .is_some_and(|m| m.contains("contains()")));
        assert!(bot_condition_problem("github.actor_id == '49699333'")
            .is_some_and(|m| m.starts_with("Using string comparison")));
        assert!(bot_condition_problem("github.actor_id == 49699333").is_none());
        assert!(bot_condition_problem("github.event_name == 'push'").is_none());
    }

    #[test]
    fn test_bot_conditions_recipe() {
        let yaml = r#"
jobs:
  automerge:
    if: github.actor == 'renovate[bot]'
    steps:
      - run: gh pr merge
        if: github.event_name == 'pull_request'
"#;
        let out = run(&BotConditions {}, CI, yaml);
        assert_eq!(locations(&out), vec!["$.jobs.automerge.if"]);
    }

    #[test]
    fn test_anonymous_jobs() {
        let yaml = r#"
jobs:
  build:
    runs-on: ubuntu-latest
  named:
    name: Unit tests
    runs-on: ubuntu-latest
  call:
    uses: org/repo/.github/workflows/w.yml@v1
"#;
        let out = run(&AnonymousJobs {}, CI, yaml);
        assert_eq!(locations(&out), vec!["$.jobs.build"]);
        assert!(out.edits.is_empty());
    }
}
