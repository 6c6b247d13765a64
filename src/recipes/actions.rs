//! Step `uses:` references and the recipes that retarget them.
//!
//! A reference looks like `owner/repo[/path]@ref`. Local actions (`./x`) and
//! container actions (`docker://img`) parse too, but have no owner.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{for_each_step_mut, get_str};
use serde::Deserialize;
use serde_yaml_ng::Value;

/// A parsed `uses:` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef<'a> {
    /// Everything before `@`
    pub name: &'a str,
    /// Everything after the first `@`, if present
    pub version: Option<&'a str>,
}

impl<'a> ActionRef<'a> {
    pub fn parse(uses: &'a str) -> Self {
        match uses.split_once('@') {
            Some((name, version)) => Self {
                name,
                version: Some(version),
            },
            None => Self {
                name: uses,
                version: None,
            },
        }
    }

    /// `owner` of `owner/repo`, `None` for local and container actions.
    pub fn owner(&self) -> Option<&'a str> {
        if self.is_local() || self.is_docker() {
            return None;
        }
        self.name.split_once('/').map(|(owner, _)| owner)
    }

    pub fn is_local(&self) -> bool {
        self.name.starts_with("./")
    }

    pub fn is_docker(&self) -> bool {
        self.name.starts_with("docker://")
    }

    /// Numeric major of the ref: `v4` and `v4.1.0` give 4, `main` gives `None`.
    pub fn major(&self) -> Option<u32> {
        let version = self.version?;
        let digits: String = version
            .strip_prefix('v')
            .unwrap_or(version)
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }

    /// True when this references `action`, with or without a ref.
    pub fn is(&self, action: &str) -> bool {
        self.name == action
    }
}

/// `uses` of a step mapping, parsed.
pub fn step_action(step: &serde_yaml_ng::Mapping) -> Option<ActionRef<'_>> {
    get_str(step, "uses").map(ActionRef::parse)
}

// ============================================================================
// change-action
// ============================================================================

pub static CHANGE_ACTION: RecipeInfo = RecipeInfo {
    name: "change-action",
    display_name: "Change GitHub Action",
    description: "Replace one action with another, pinned to the given version.",
    options: &[
        "old-action: action to replace, e.g. gradle/wrapper-validation-action",
        "new-action: replacement action, e.g. gradle/actions/wrapper-validation",
        "new-version: ref for the new action, e.g. v3",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChangeAction {
    pub old_action: String,
    pub new_action: String,
    pub new_version: String,
}

impl Recipe for ChangeAction {
    fn info(&self) -> &'static RecipeInfo {
        &CHANGE_ACTION
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("old-action", &self.old_action),
            ("new-action", &self.new_action),
            ("new-version", &self.new_version),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty", field));
            }
        }
        if self.old_action.contains('@') || self.new_action.contains('@') {
            errors.push("actions must not carry an @ref; use new-version".to_string());
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let target = format!("{}@{}", self.new_action, self.new_version);
        retarget_uses(doc, ctx, &self.old_action, &target);
    }
}

// ============================================================================
// change-action-version
// ============================================================================

pub static CHANGE_ACTION_VERSION: RecipeInfo = RecipeInfo {
    name: "change-action-version",
    display_name: "Change GitHub Action version",
    description: "Pin every use of an action to a specific ref.",
    options: &[
        "action: action to pin, e.g. actions/checkout",
        "version: ref to pin to, e.g. v4 or a commit SHA",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChangeActionVersion {
    pub action: String,
    pub version: String,
}

impl Recipe for ChangeActionVersion {
    fn info(&self) -> &'static RecipeInfo {
        &CHANGE_ACTION_VERSION
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.action.trim().is_empty() || self.action.contains('@') {
            errors.push("action must be a non-empty name without @ref".to_string());
        }
        if self.version.trim().is_empty() {
            errors.push("version must not be empty".to_string());
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let target = format!("{}@{}", self.action, self.version);
        retarget_uses(doc, ctx, &self.action, &target);
    }
}

/// Point every step that uses `action` at `target`.
fn retarget_uses(doc: &mut Value, ctx: &mut VisitContext, action: &str, target: &str) {
    for_each_step_mut(doc, &mut |path, step| {
        let Some(previous) = get_str(step, "uses") else {
            return;
        };
        if !ActionRef::parse(previous).is(action) || previous == target {
            return;
        }
        let previous = previous.to_string();
        step.insert("uses".into(), Value::String(target.to_string()));
        ctx.edited(&path.key("uses"), format!("{} -> {}", previous, target));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{assert_rewrites, assert_unchanged, CI};

    #[test]
    fn test_parse_action_ref() {
        let r = ActionRef::parse("actions/setup-java@v4");
        assert_eq!(r.name, "actions/setup-java");
        assert_eq!(r.version, Some("v4"));
        assert_eq!(r.owner(), Some("actions"));
        assert_eq!(r.major(), Some(4));

        let r = ActionRef::parse("gradle/actions/setup-gradle@v3.1.0");
        assert_eq!(r.name, "gradle/actions/setup-gradle");
        assert_eq!(r.major(), Some(3));

        let r = ActionRef::parse("actions/checkout");
        assert_eq!(r.version, None);
        assert_eq!(r.major(), None);
    }

    #[test]
    fn test_parse_local_and_docker() {
        assert!(ActionRef::parse("./.github/actions/build").is_local());
        assert_eq!(ActionRef::parse("./.github/actions/build").owner(), None);
        assert!(ActionRef::parse("docker://alpine:3.8").is_docker());
        assert_eq!(ActionRef::parse("docker://alpine:3.8").owner(), None);
    }

    #[test]
    fn test_major_of_branch_is_none() {
        assert_eq!(ActionRef::parse("actions/checkout@main").major(), None);
        assert_eq!(ActionRef::parse("actions/checkout@1.2").major(), Some(1));
    }

    #[test]
    fn test_change_action() {
        let recipe = ChangeAction {
            old_action: "gradle/wrapper-validation-action".to_string(),
            new_action: "gradle/actions/wrapper-validation".to_string(),
            new_version: "v3".to_string(),
        };
        assert_rewrites(
            &recipe,
            CI,
            r#"
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: gradle/wrapper-validation-action@v1
      - uses: gradle/wrapper-validation-action
"#,
            r#"
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: gradle/actions/wrapper-validation@v3
      - uses: gradle/actions/wrapper-validation@v3
"#,
        );
    }

    #[test]
    fn test_change_action_prefix_is_not_a_match() {
        let recipe = ChangeAction {
            old_action: "actions/setup".to_string(),
            new_action: "x/y".to_string(),
            new_version: "v1".to_string(),
        };
        assert_unchanged(
            &recipe,
            CI,
            "jobs:\n  b:\n    steps:\n      - uses: actions/setup-java@v4\n",
        );
    }

    #[test]
    fn test_change_action_version() {
        let recipe = ChangeActionVersion {
            action: "actions/checkout".to_string(),
            version: "v4".to_string(),
        };
        assert_rewrites(
            &recipe,
            CI,
            "jobs:\n  b:\n    steps:\n      - uses: actions/checkout@v2\n      - uses: actions/cache@v2\n",
            "jobs:\n  b:\n    steps:\n      - uses: actions/checkout@v4\n      - uses: actions/cache@v2\n",
        );
    }

    #[test]
    fn test_change_action_version_validation() {
        let recipe = ChangeActionVersion {
            action: "actions/checkout@v2".to_string(),
            version: String::new(),
        };
        assert_eq!(recipe.validate().len(), 2);
    }
}
