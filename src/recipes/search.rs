//! Search-only recipes. They report findings and never change the document.

use super::actions::ActionRef;
use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{contains_key_deep, for_each_job_mut, for_each_step_mut, get_str};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::sync::LazyLock;

// ============================================================================
// find-missing-timeout
// ============================================================================

pub static FIND_MISSING_TIMEOUT: RecipeInfo = RecipeInfo {
    name: "find-missing-timeout",
    display_name: "Find jobs missing timeout",
    description: "Report jobs with no `timeout-minutes`; they run for up to six hours by default.",
    options: &[],
};

pub const MISSING_TIMEOUT: &str = "missing: $.jobs.*.timeout-minutes";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindMissingTimeout {}

impl Recipe for FindMissingTimeout {
    fn info(&self) -> &'static RecipeInfo {
        &FIND_MISSING_TIMEOUT
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_job_mut(doc, &mut |_, path, job| {
            let has_timeout = job.iter().any(|(k, v)| {
                k.as_str() == Some("timeout-minutes") || contains_key_deep(v, "timeout-minutes")
            });
            if !has_timeout {
                ctx.found(path, MISSING_TIMEOUT);
            }
        });
    }
}

// ============================================================================
// find-unpinned-actions
// ============================================================================

pub static FIND_UNPINNED_ACTIONS: RecipeInfo = RecipeInfo {
    name: "find-unpinned-actions",
    display_name: "Find unpinned uses of third-party actions",
    description: "Report actions referenced by branch, tag or not at all instead of a full \
                  commit SHA.",
    options: &[],
};

static UNPINNED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^/@]+/[^/@]+)(@(main|master|HEAD|latest|v?\d+(\.\d+)*))?$")
        .expect("unpinned regex is valid")
});

static COMMIT_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("sha regex is valid"));

/// The problem with `uses`, if any.
pub fn unpinned_reason(uses: &str) -> Option<String> {
    let action = ActionRef::parse(uses);
    if action.is_local() || action.is_docker() {
        return None;
    }
    let Some(version) = action.version else {
        return Some(format!("unpinned action: {} has no version", action.name));
    };
    if COMMIT_SHA.is_match(version) || !UNPINNED.is_match(uses) {
        return None;
    }
    Some(format!("unpinned action: {} uses mutable ref {}", action.name, version))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindUnpinnedActions {}

impl Recipe for FindUnpinnedActions {
    fn info(&self) -> &'static RecipeInfo {
        &FIND_UNPINNED_ACTIONS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_step_mut(doc, &mut |path, step| {
            if let Some(reason) = get_str(step, "uses").and_then(unpinned_reason) {
                ctx.found(&path.key("uses"), reason);
            }
        });
    }
}
