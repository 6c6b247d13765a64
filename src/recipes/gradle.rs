//! Prefer the Gradle wrapper over a `gradle` binary on the runner.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{for_each_job_mut, get_str, key_text, YamlPath};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

pub static USE_GRADLE_WRAPPER: RecipeInfo = RecipeInfo {
    name: "use-gradle-wrapper",
    display_name: "Use Gradle Wrapper instead of Gradle binary directly",
    description: "Replace calls to `gradle` with the Gradle Wrapper when the repository has a \
                  `gradlew` script.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseGradleWrapper {}

/// Wrapper invocation for a runner label.
fn wrapper_for(runs_on: &str) -> Option<&'static str> {
    if runs_on.starts_with("ubuntu-") || runs_on.starts_with("macos-") {
        Some("./gradlew ")
    } else if runs_on.starts_with("windows-") {
        Some("gradlew ")
    } else {
        None
    }
}

fn rewrite_script(script: &str, wrapper: &str) -> String {
    script
        .split('\n')
        .map(|line| match line.strip_prefix("gradle ") {
            Some(rest) => format!("{}{}", wrapper, rest),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite every `run` scalar under `node`.
fn rewrite_runs(node: &mut Value, path: &YamlPath, wrapper: &str, ctx: &mut VisitContext) {
    match node {
        Value::Mapping(mapping) => rewrite_mapping(mapping, path, wrapper, ctx),
        Value::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                rewrite_runs(item, &path.index(i), wrapper, ctx);
            }
        }
        _ => {}
    }
}

fn rewrite_mapping(mapping: &mut Mapping, path: &YamlPath, wrapper: &str, ctx: &mut VisitContext) {
    for (key, value) in mapping.iter_mut() {
        let key = key_text(key);
        let child = path.key(&key);
        if key == "run" {
            if let Value::String(script) = value {
                let next = rewrite_script(script, wrapper);
                if next != *script {
                    *script = next;
                    ctx.edited(&child, format!("gradle -> {}", wrapper.trim_end()));
                }
                continue;
            }
        }
        rewrite_runs(value, &child, wrapper, ctx);
    }
}

impl Recipe for UseGradleWrapper {
    fn info(&self) -> &'static RecipeInfo {
        &USE_GRADLE_WRAPPER
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        if !ctx.root.join("gradlew").is_file() {
            return;
        }
        for_each_job_mut(doc, &mut |_, path, job| {
            let Some(wrapper) = get_str(job, "runs-on").and_then(wrapper_for) else {
                return;
            };
            rewrite_mapping(job, path, wrapper, ctx);
        });
    }
}
