//! Recipes for `actions/setup-java` steps: distribution names, the Java
//! version, and dependency caching.

use super::actions::{step_action, ActionRef};
use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{
    child_mapping_mut, for_each_step_mut, get_str, lookup_mut, replace_scalar, scalar_text,
    YamlPath,
};
use crate::core::version;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

pub const SETUP_JAVA: &str = "actions/setup-java";

/// `with.distribution` only exists from setup-java v2 onwards.
const FIRST_DISTRIBUTION_MAJOR: u32 = 2;

fn is_setup_java(step: &Mapping) -> bool {
    step_action(step).is_some_and(|r| r.is(SETUP_JAVA))
}

/// Rewrite `with.distribution` on setup-java v2+ steps where `from` accepts it.
fn replace_distribution(
    doc: &mut Value,
    ctx: &mut VisitContext,
    from: &dyn Fn(&str) -> bool,
    to: &str,
) {
    for_each_step_mut(doc, &mut |path, step| {
        let pinned = get_str(step, "uses")
            .map(ActionRef::parse)
            .filter(|r| r.is(SETUP_JAVA))
            .and_then(|r| r.major())
            .is_some_and(|major| major >= FIRST_DISTRIBUTION_MAJOR);
        if !pinned {
            return;
        }
        let Some(with) = step.get_mut("with").and_then(Value::as_mapping_mut) else {
            return;
        };
        let Some(slot) = with.get_mut("distribution") else {
            return;
        };
        let Some(current) = scalar_text(slot) else {
            return;
        };
        if current == to || !from(&current) {
            return;
        }
        replace_scalar(slot, to);
        ctx.edited(
            &path.key("with").key("distribution"),
            format!("{} -> {}", current, to),
        );
    });
}

// ============================================================================
// Distribution names
// ============================================================================

pub static ADOPT_TO_TEMURIN: RecipeInfo = RecipeInfo {
    name: "setup-java-adopt-openjdk-to-temurin",
    display_name: "Use actions/setup-java `temurin` distribution in favor of `adopt`",
    description: "Adopt OpenJDK got moved to Eclipse Temurin and won't be updated anymore.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdoptOpenJdkToTemurin {}

impl Recipe for AdoptOpenJdkToTemurin {
    fn info(&self) -> &'static RecipeInfo {
        &ADOPT_TO_TEMURIN
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        replace_distribution(
            doc,
            ctx,
            &|d| d == "adopt" || d == "adopt-hotspot",
            "temurin",
        );
    }
}

pub static ADOPT_OPENJ9_TO_SEMERU: RecipeInfo = RecipeInfo {
    name: "setup-java-adopt-openj9-to-semeru",
    display_name: "Use actions/setup-java IBM `semeru` distribution in favor of `adopt-openj9`",
    description: "Adopt OpenJDK got moved to Eclipse Temurin; the OpenJ9 builds moved to IBM Semeru.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdoptOpenJ9ToSemeru {}

impl Recipe for AdoptOpenJ9ToSemeru {
    fn info(&self) -> &'static RecipeInfo {
        &ADOPT_OPENJ9_TO_SEMERU
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        replace_distribution(doc, ctx, &|d| d == "adopt-openj9", "semeru");
    }
}

pub static PREFER_TEMURIN: RecipeInfo = RecipeInfo {
    name: "prefer-temurin-distributions",
    display_name: "Use `actions/setup-java` `temurin` distribution",
    description: "Replace every setup-java distribution with Eclipse Temurin.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferTemurinDistributions {}

impl Recipe for PreferTemurinDistributions {
    fn info(&self) -> &'static RecipeInfo {
        &PREFER_TEMURIN
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        replace_distribution(doc, ctx, &|_| true, "temurin");
    }
}

pub static REPLACE_DISTRIBUTION: RecipeInfo = RecipeInfo {
    name: "replace-setup-java-distribution",
    display_name: "Replace actions/setup-java distribution",
    description: "Replace any of the listed setup-java distributions with another one.",
    options: &[
        "from: distributions to replace, e.g. [adopt, adopt-hotspot]",
        "to: replacement distribution, e.g. temurin",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReplaceDistribution {
    pub from: Vec<String>,
    pub to: String,
}

impl Recipe for ReplaceDistribution {
    fn info(&self) -> &'static RecipeInfo {
        &REPLACE_DISTRIBUTION
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.from.is_empty() {
            errors.push("from must list at least one distribution".to_string());
        }
        if self.to.trim().is_empty() {
            errors.push("to must not be empty".to_string());
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        replace_distribution(doc, ctx, &|d| self.from.iter().any(|f| f == d), &self.to);
    }
}

// ============================================================================
// Java version
// ============================================================================

pub static UPGRADE_JAVA_VERSION: RecipeInfo = RecipeInfo {
    name: "setup-java-upgrade-java-version",
    display_name: "Upgrade `actions/setup-java` `java-version`",
    description: "Raise `with.java-version` of setup-java steps to at least the given major.",
    options: &["minimum-java-major-version: lowest acceptable major (default 21)"],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UpgradeJavaVersion {
    #[serde(default = "default_java_major")]
    pub minimum_java_major_version: u32,
}

fn default_java_major() -> u32 {
    21
}

impl Recipe for UpgradeJavaVersion {
    fn info(&self) -> &'static RecipeInfo {
        &UPGRADE_JAVA_VERSION
    }

    fn validate(&self) -> Vec<String> {
        if self.minimum_java_major_version == 0 {
            return vec!["minimum-java-major-version must be positive".to_string()];
        }
        Vec::new()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        upgrade_tool_version(
            doc,
            ctx,
            SETUP_JAVA,
            "java-version",
            self.minimum_java_major_version,
        );
    }
}

/// Shared by the Java and Node upgraders: raise `with.<key>` on steps using
/// `action@<ref>` when its major is strictly below `minimum`. A bare
/// `uses: <action>` with no ref is not matched.
pub(crate) fn upgrade_tool_version(
    doc: &mut Value,
    ctx: &mut VisitContext,
    action: &str,
    key: &str,
    minimum: u32,
) {
    for_each_step_mut(doc, &mut |path, step| {
        if !step_action(step).is_some_and(|r| r.is(action) && r.version.is_some()) {
            return;
        }
        let Some(slot) = step.get_mut("with").and_then(|with| with.get_mut(key)) else {
            return;
        };
        let Some(current) = scalar_text(slot) else {
            return;
        };
        if let Some(next) = version::upgrade_major(&current, minimum) {
            replace_scalar(slot, &next);
            ctx.edited(&path.key("with").key(key), format!("{} -> {}", current, next));
        }
    });
}

// ============================================================================
// Caching
// ============================================================================

pub static CACHING: RecipeInfo = RecipeInfo {
    name: "setup-java-caching",
    display_name: "Enable caching for Maven and Gradle builds",
    description: "Use setup-java's built-in dependency cache instead of actions/cache.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupJavaCaching {}

impl SetupJavaCaching {
    /// Build tool named by any `jobs.build.steps[*].run`. Gradle wins when
    /// both appear.
    fn build_tool(steps: &[Value]) -> Option<&'static str> {
        let runs: Vec<&str> = steps
            .iter()
            .filter_map(|s| s.get("run").and_then(Value::as_str))
            .collect();
        if runs.iter().any(|r| r.contains("gradle")) {
            Some("gradle")
        } else if runs.iter().any(|r| r.contains("mvn")) {
            Some("maven")
        } else {
            None
        }
    }
}

impl Recipe for SetupJavaCaching {
    fn info(&self) -> &'static RecipeInfo {
        &CACHING
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Some(steps) =
            lookup_mut(doc, &["jobs", "build", "steps"]).and_then(Value::as_sequence_mut)
        else {
            return;
        };
        let Some(tool) = Self::build_tool(steps) else {
            return;
        };

        let base = YamlPath::root().key("jobs").key("build").key("steps");
        let mut merged = false;
        for (i, step) in steps.iter_mut().enumerate() {
            let Some(step) = step.as_mapping_mut() else {
                continue;
            };
            if !is_setup_java(step) {
                continue;
            }
            let Some(with) = child_mapping_mut(step, "with") else {
                continue;
            };
            if with.contains_key("cache") {
                continue;
            }
            with.insert("cache".into(), tool.into());
            ctx.edited(&base.index(i).key("with").key("cache"), format!("cache: {}", tool));
            merged = true;
        }

        if merged {
            let mut i = 0;
            steps.retain(|step| {
                let keep = !step
                    .as_mapping()
                    .and_then(step_action)
                    .is_some_and(|r| r.is("actions/cache"));
                if !keep {
                    ctx.edited(&base.index(i), "removed actions/cache step");
                }
                i += 1;
                keep
            });
        }
    }
}
