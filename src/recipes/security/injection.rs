//! Untrusted input reaching a shell or script.

use super::{dangerous_trigger, is_truthy};
use crate::core::document::{for_each_entry, for_each_step_mut, get_str, scalar_text};
use crate::recipes::actions::ActionRef;
use crate::recipes::{Recipe, RecipeInfo, VisitContext};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::sync::LazyLock;

// ============================================================================
// template-injection
// ============================================================================

pub static TEMPLATE_INJECTION: RecipeInfo = RecipeInfo {
    name: "template-injection",
    display_name: "Find template injection",
    description: "Report `${{ }}` expressions over attacker-controlled context (issue titles, \
                  PR bodies, branch names, step outputs) expanded into `run` or script inputs.",
    options: &[],
};

/// Context fields an outside contributor can set.
const DANGEROUS_CONTEXTS: &[&str] = &[
    "github.event.pull_request.title",
    "github.event.pull_request.body",
    "github.event.pull_request.head.ref",
    "github.event.pull_request.head.label",
    "github.event.pull_request.head.repo.default_branch",
    "github.event.pull_request.base.ref",
    "github.event.issue.title",
    "github.event.issue.body",
    "github.event.comment.body",
    "github.event.review.body",
    "github.event.pages[0].page_name",
    "github.event.commits[0].message",
    "github.event.head_commit.message",
    "github.event.commits[0].author.name",
    "github.event.commits[0].author.email",
    "github.head_ref",
];

/// Actions that evaluate one of their inputs as code.
const CODE_INJECTION_ACTIONS: &[&str] = &[
    "actions/github-script",
    "amadevus/pwsh-script",
    "jannekem/run-python-script-action",
    "cardinalby/js-eval-action",
];

static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{([^}]+)\}\}").expect("expression regex is valid"));

static STEPS_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"steps\.[^.]+\.outputs\.[^\s}]+").expect("steps output regex is valid")
});

/// Describes the first tainted expression in `text`.
fn tainted_input(text: &str) -> Option<String> {
    EXPRESSION.captures_iter(text).find_map(|caps| {
        let expression = caps[1].trim();
        let context = DANGEROUS_CONTEXTS
            .iter()
            .find(|context| expression.contains(*context));
        let complex = expression.contains('(') && expression.contains(')');
        match context {
            Some(_) if complex => Some("User-controlled input in complex expression".to_string()),
            Some(context) => Some(format!("User-controlled input '{}'", context)),
            None => STEPS_OUTPUT
                .find(expression)
                .map(|m| format!("User-controlled input '{}'", m.as_str())),
        }
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateInjection {}

impl Recipe for TemplateInjection {
    fn info(&self) -> &'static RecipeInfo {
        &TEMPLATE_INJECTION
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_step_mut(doc, &mut |path, step| {
            if let Some(input) = get_str(step, "run").and_then(tainted_input) {
                ctx.found(
                    &path.key("run"),
                    format!(
                        "Potential template injection vulnerability. {} used in run command \
                         without proper escaping.",
                        input
                    ),
                );
            }
            let evaluates_code = get_str(step, "uses").is_some_and(|uses| {
                CODE_INJECTION_ACTIONS
                    .iter()
                    .any(|action| uses.starts_with(action))
            });
            if evaluates_code {
                ctx.found(
                    &path.key("uses"),
                    "Potential code injection in script input. User-controlled content in \
                     script execution context.",
                );
            }
            let script = step
                .get("with")
                .and_then(|with| with.get("script"))
                .and_then(Value::as_str);
            if let Some(input) = script.and_then(tainted_input) {
                ctx.found(
                    &path.key("with").key("script"),
                    format!(
                        "Potential code injection in script. {} used in script without proper \
                         escaping.",
                        input
                    ),
                );
            }
        });
    }
}

// ============================================================================
// github-env
// ============================================================================

pub static GITHUB_ENV: RecipeInfo = RecipeInfo {
    name: "github-env",
    display_name: "Find dangerous GITHUB_ENV usage",
    description: "Report writes to `GITHUB_ENV` or `GITHUB_PATH` in workflows triggered by \
                  `pull_request_target` or `workflow_run`.",
    options: &[],
};

static ENV_FILE_WRITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)(>>?\s*["']?\$\{?GITHUB_ENV\}?["']?"#,
        r#"|>>?\s*["']?%GITHUB_ENV%["']?"#,
        r#"|>>?\s*["']?\$env:GITHUB_ENV["']?"#,
        r#"|Out-File.*\$env:GITHUB_ENV"#,
        r#"|Add-Content.*\$env:GITHUB_ENV"#,
        r#"|Set-Content.*\$env:GITHUB_ENV"#,
        r#"|Tee-Object.*\$env:GITHUB_ENV"#,
        r#"|\|\s*tee\s+["']?\$\{?GITHUB_ENV\}?["']?)"#,
        r#"|GITHUB_PATH"#,
    ))
    .expect("env file regex is valid")
});

static STATIC_ECHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*echo\s+["']?[^$`]*["']?\s*>>"#).expect("static echo regex is valid")
});

/// Writes whose content is a literal cannot carry attacker input.
fn is_static_echo(run: &str) -> bool {
    STATIC_ECHO.is_match(run) && !run.contains('$') && !run.contains('`')
}

fn env_file_named(run: &str) -> &'static str {
    let upper = run.to_ascii_uppercase();
    if upper.contains("GITHUB_ENV") {
        "GITHUB_ENV"
    } else if upper.contains("GITHUB_PATH") {
        "GITHUB_PATH"
    } else {
        "environment file"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubEnv {}

impl Recipe for GithubEnv {
    fn info(&self) -> &'static RecipeInfo {
        &GITHUB_ENV
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        if dangerous_trigger(doc).is_none() {
            return;
        }
        for_each_entry(doc, &mut |path, key, value| {
            let Some(run) = value.as_str().filter(|_| key == "run") else {
                return;
            };
            if !ENV_FILE_WRITE.is_match(run) || is_static_echo(run) {
                return;
            }
            ctx.found(
                path,
                format!(
                    "Write to {} may allow code execution in a workflow with dangerous triggers. \
                     This can lead to code injection when the written content includes \
                     user-controlled data. Ensure any dynamic content is properly sanitized or \
                     avoid writing to environment files in workflows triggered by untrusted \
                     events.",
                    env_file_named(run)
                ),
            );
        });
    }
}

// ============================================================================
// insecure-commands
// ============================================================================

pub static INSECURE_COMMANDS: RecipeInfo = RecipeInfo {
    name: "insecure-commands",
    display_name: "Find insecure commands configuration",
    description: "Report `ACTIONS_ALLOW_UNSECURE_COMMANDS` set to a true value, which re-enables \
                  the deprecated `set-env` and `add-path` workflow commands.",
    options: &[],
};

pub const INSECURE_COMMANDS_VAR: &str = "ACTIONS_ALLOW_UNSECURE_COMMANDS";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsecureCommands {}

impl Recipe for InsecureCommands {
    fn info(&self) -> &'static RecipeInfo {
        &INSECURE_COMMANDS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            if key != INSECURE_COMMANDS_VAR {
                return;
            }
            if scalar_text(value).is_some_and(|v| is_truthy(&v)) {
                ctx.found(
                    path,
                    "Insecure commands are enabled via ACTIONS_ALLOW_UNSECURE_COMMANDS. This \
                     allows dangerous workflow commands that can lead to code injection. Remove \
                     this environment variable to disable insecure commands.",
                );
            }
        });
    }
}

// ============================================================================
// obfuscation
// ============================================================================

pub static OBFUSCATION: RecipeInfo = RecipeInfo {
    name: "obfuscation",
    display_name: "Find obfuscated GitHub Actions features",
    description: "Report action references with `.`, `..` or empty path components, and run \
                  scripts whose expressions play quoting tricks.",
    options: &[],
};

static OBFUSCATED_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$\{\{[^}]*['"]\}|['"]{2,}|\{\{[^}]*\$"#).expect("obfuscation regex is valid")
});

fn has_obfuscated_path(uses: &str) -> bool {
    let action = ActionRef::parse(uses);
    if action.version.is_none() {
        return false;
    }
    action.name.contains("//") || action.name.split('/').any(|c| c == "." || c == "..")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Obfuscation {}

impl Recipe for Obfuscation {
    fn info(&self) -> &'static RecipeInfo {
        &OBFUSCATION
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_entry(doc, &mut |path, key, value| {
            let Some(text) = value.as_str() else {
                return;
            };
            match key {
                "uses" => {
                    let action = ActionRef::parse(text);
                    if !action.is_local() && !action.is_docker() && has_obfuscated_path(text) {
                        ctx.found(
                            path,
                            "Action reference contains obfuscated path components that may \
                             hide the actual action being used.",
                        );
                    }
                }
                "run" if OBFUSCATED_EXPRESSION.is_match(text) => ctx.found(
                    path,
                    "Contains potentially obfuscated GitHub Actions expressions that may be \
                     attempting to hide malicious code.",
                ),
                _ => {}
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
    fn test_template_injection_in_run() {
        let yaml = r#"
on: issues
jobs:
  triage:
    steps:
      - run: echo "${{ github.event.issue.title }}"
      - run: echo "${{ github.event.issue.number }}"
      - run: echo "${{ steps.meta.outputs.tags }}"
"#;
        let out = run(&TemplateInjection {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.triage.steps[0].run", "$.jobs.triage.steps[2].run"]
        );
        assert_eq!(
            out.findings[0].message,
            "Potential template injection vulnerability. User-controlled input \
             'github.event.issue.title' used in run command without proper escaping."
        );
        assert!(out.findings[1].message.contains("'steps.meta.outputs.tags'"));
        assert!(out.edits.is_empty());
    }

    #[test]
    fn test_template_injection_complex_expression() {
        assert_eq!(
            tainted_input("${{ contains(github.event.pull_request.title, 'fix') }}").as_deref(),
            Some("User-controlled input in complex expression")
        );
        assert_eq!(tainted_input("${{ github.sha }}"), None);
        assert_eq!(tainted_input("plain text"), None);
    }

    #[test]
    fn test_template_injection_in_script() {
        let yaml = r#"
jobs:
  comment:
    steps:
      - uses: actions/github-script@v7
        with:
          script: console.log("${{ github.event.comment.body }}")
"#;
        let out = run(&TemplateInjection {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.jobs.comment.steps[0].uses",
                "$.jobs.comment.steps[0].with.script"
            ]
        );
        assert!(out.findings[1]
            .message
            .starts_with("Potential code injection in script. User-controlled input"));
    }

    #[test]
    fn test_github_env_needs_dangerous_trigger() {
        let body = r#"
jobs:
  build:
    steps:
      - run: echo "TITLE=${{ github.event.pull_request.title }}" >> $GITHUB_ENV
      - run: echo "/opt/bin" >> "$GITHUB_PATH"
      - run: make
"#;
        let safe = run(&GithubEnv {}, CI, &format!("on: pull_request\n{}", body));
        assert!(safe.findings.is_empty());

        let out = run(&GithubEnv {}, CI, &format!("on: pull_request_target\n{}", body));
        assert_eq!(
            locations(&out),
            vec!["$.jobs.build.steps[0].run", "$.jobs.build.steps[1].run"]
        );
        assert!(out.findings[0].message.starts_with("Write to GITHUB_ENV"));
        assert!(out.findings[1].message.starts_with("Write to GITHUB_PATH"));
    }

    #[test]
    fn test_github_env_static_echo_ignored() {
        assert!(is_static_echo("echo \"MODE=release\" >> %GITHUB_ENV%"));
        assert!(!is_static_echo("echo \"MODE=$MODE\" >> $GITHUB_ENV"));
    }

    #[test]
    fn test_insecure_commands() {
        let yaml = r#"
env:
  ACTIONS_ALLOW_UNSECURE_COMMANDS: true
jobs:
  a:
    env:
      ACTIONS_ALLOW_UNSECURE_COMMANDS: "no"
    steps:
      - run: echo hi
        env:
          ACTIONS_ALLOW_UNSECURE_COMMANDS: "Yes"
"#;
        let out = run(&InsecureCommands {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec![
                "$.env.ACTIONS_ALLOW_UNSECURE_COMMANDS",
                "$.jobs.a.steps[0].env.ACTIONS_ALLOW_UNSECURE_COMMANDS"
            ]
        );
    }

    #[test]
    fn test_obfuscated_paths() {
        assert!(has_obfuscated_path("actions/checkout/.@v4"));
        assert!(has_obfuscated_path("actions/cache/../checkout@v4"));
        assert!(has_obfuscated_path("actions//checkout@v4"));
        assert!(!has_obfuscated_path("actions/checkout@v4"));
        assert!(!has_obfuscated_path("actions/./checkout"));
    }

    #[test]
    fn test_obfuscation_recipe() {
        let yaml = r#"
jobs:
  a:
    steps:
      - uses: ./.github/actions/../local
      - uses: github/codeql-action/./init@v3
      - run: echo ${{ 'a'}}
      - run: echo ok
"#;
        let out = run(&Obfuscation {}, CI, yaml);
        assert_eq!(
            locations(&out),
            vec!["$.jobs.a.steps[1].uses", "$.jobs.a.steps[2].run"]
        );
    }
}
