//! Replace `actions/setup-python` with `astral-sh/setup-uv`, translating the
//! pip commands of the same job.

use super::actions::step_action;
use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{for_each_job_mut, get_str};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::sync::LazyLock;

pub const SETUP_PYTHON: &str = "actions/setup-python";
pub const SETUP_UV: &str = "astral-sh/setup-uv";

pub static SETUP_PYTHON_TO_UV: RecipeInfo = RecipeInfo {
    name: "setup-python-to-uv",
    display_name: "Replace `actions/setup-python` with `astral-sh/setup-uv`",
    description: "Switch Python jobs to uv: the setup action, its pip cache, and the \
                  `pip install` / `python -m` commands of the same job.",
    options: &[
        "uv-version: ref of astral-sh/setup-uv (default v6)",
        "sync-strategy: basic | locked | full (default basic)",
        "transform-pip-commands: rewrite pip and python -m run steps (default true)",
        "enable-cache: turn `cache: pip` into `enable-cache: \"true\"` (default true)",
    ],
};

static PIP_UPGRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^python -m pip install --upgrade pip$").expect("pip upgrade regex is valid")
});

static PIP_INSTALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^pip install (-r requirements\.txt|\.|-e \.)$").expect("pip install regex is valid")
});

static PYTHON_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^python -m (.+)$").expect("python module regex is valid"));

/// How `pip install` lines are translated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    #[default]
    Basic,
    Locked,
    Full,
}

impl SyncStrategy {
    pub fn command(self) -> &'static str {
        match self {
            Self::Basic => "uv sync",
            Self::Locked => "uv sync --locked",
            Self::Full => "uv sync --all-extras --dev",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SetupPythonToUv {
    #[serde(default = "default_uv_version")]
    pub uv_version: String,

    #[serde(default)]
    pub sync_strategy: SyncStrategy,

    #[serde(default = "enabled")]
    pub transform_pip_commands: bool,

    #[serde(default = "enabled")]
    pub enable_cache: bool,
}

fn default_uv_version() -> String {
    "v6".to_string()
}

fn enabled() -> bool {
    true
}

impl Default for SetupPythonToUv {
    fn default() -> Self {
        Self {
            uv_version: default_uv_version(),
            sync_strategy: SyncStrategy::default(),
            transform_pip_commands: true,
            enable_cache: true,
        }
    }
}

impl SetupPythonToUv {
    /// Replacement for a `run` line, `None` when it is left as is.
    fn translate(&self, run: &str) -> Option<String> {
        if PIP_INSTALL.is_match(run) {
            return Some(self.sync_strategy.command().to_string());
        }
        PYTHON_MODULE
            .captures(run)
            .map(|caps| format!("uv run {}", &caps[1]))
    }

    /// Rewrite the `with` block of a setup-python step for setup-uv.
    fn convert_with(&self, with: &mut Mapping) -> Vec<&'static str> {
        let mut changes = Vec::new();
        if with.shift_remove("cache-dependency-path").is_some() {
            changes.push("removed cache-dependency-path");
        }
        let pip_cache = get_str(with, "cache") == Some("pip");
        if self.enable_cache && pip_cache && !with.contains_key("enable-cache") {
            let entries = std::mem::take(with);
            *with = entries
                .into_iter()
                .map(|(k, v)| match k.as_str() {
                    Some("cache") => ("enable-cache".into(), "true".into()),
                    _ => (k, v),
                })
                .collect();
            changes.push("cache: pip -> enable-cache: true");
        }
        changes
    }
}

fn is_pip_upgrade(step: &Value) -> bool {
    step.as_mapping()
        .and_then(|s| get_str(s, "run"))
        .is_some_and(|run| PIP_UPGRADE.is_match(run))
}

impl Recipe for SetupPythonToUv {
    fn info(&self) -> &'static RecipeInfo {
        &SETUP_PYTHON_TO_UV
    }

    fn validate(&self) -> Vec<String> {
        if self.uv_version.trim().is_empty() {
            return vec!["uv-version must not be empty".to_string()];
        }
        Vec::new()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_job_mut(doc, &mut |_, job_path, job| {
            let Some(steps) = job.get_mut("steps").and_then(Value::as_sequence_mut) else {
                return;
            };
            let uses_python = steps.iter().any(|step| {
                step.as_mapping()
                    .and_then(step_action)
                    .is_some_and(|r| r.is(SETUP_PYTHON))
            });
            if !uses_python {
                return;
            }
            let steps_path = job_path.key("steps");

            if self.transform_pip_commands {
                let upgrades: Vec<usize> = (0..steps.len())
                    .filter(|&i| is_pip_upgrade(&steps[i]))
                    .collect();
                for &i in upgrades.iter().rev() {
                    steps.remove(i);
                }
                for i in upgrades {
                    ctx.edited(&steps_path.index(i), "removed pip self-upgrade step");
                }
            }

            for (i, step) in steps.iter_mut().enumerate() {
                let Some(step) = step.as_mapping_mut() else {
                    continue;
                };
                let step_path = steps_path.index(i);

                if step_action(step).is_some_and(|r| r.is(SETUP_PYTHON)) {
                    let old = get_str(step, "uses").unwrap_or(SETUP_PYTHON).to_string();
                    let new = format!("{}@{}", SETUP_UV, self.uv_version);
                    step.insert("uses".into(), new.clone().into());
                    ctx.edited(&step_path.key("uses"), format!("{} -> {}", old, new));

                    if let Some(with) = step.get_mut("with").and_then(Value::as_mapping_mut) {
                        for change in self.convert_with(with) {
                            ctx.edited(&step_path.key("with"), change);
                        }
                    }
                    continue;
                }

                if !self.transform_pip_commands {
                    continue;
                }
                let Some(next) = get_str(step, "run").and_then(|run| self.translate(run)) else {
                    continue;
                };
                let old = get_str(step, "run").unwrap_or_default().to_string();
                step.insert("run".into(), next.clone().into());
                ctx.edited(&step_path.key("run"), format!("{} -> {}", old, next));
            }
        });
    }
}
