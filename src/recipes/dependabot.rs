//! Dependabot configuration recipes (`.github/dependabot.yml`).

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{scalar_text, YamlPath};
use crate::core::source;
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

pub const INTERVALS: [&str; 3] = ["daily", "weekly", "monthly"];

/// Visit each mapping entry of `updates`.
fn for_each_update(doc: &mut Value, f: &mut dyn FnMut(&YamlPath, &mut Mapping)) {
    let Some(updates) = doc.get_mut("updates").and_then(Value::as_sequence_mut) else {
        return;
    };
    let base = YamlPath::root().key("updates");
    for (i, update) in updates.iter_mut().enumerate() {
        if let Some(update) = update.as_mapping_mut() {
            f(&base.index(i), update);
        }
    }
}

// ============================================================================
// change-dependabot-schedule-interval
// ============================================================================

pub static CHANGE_SCHEDULE_INTERVAL: RecipeInfo = RecipeInfo {
    name: "change-dependabot-schedule-interval",
    display_name: "Change Dependabot schedule interval",
    description: "Change how often Dependabot checks a package ecosystem for updates.",
    options: &[
        "package-ecosystem: ecosystem name or regex, e.g. maven or npm|yarn",
        "interval: daily, weekly or monthly",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChangeScheduleInterval {
    pub package_ecosystem: String,
    pub interval: String,
}

impl ChangeScheduleInterval {
    fn ecosystem_pattern(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{})$", self.package_ecosystem))
    }
}

impl Recipe for ChangeScheduleInterval {
    fn info(&self) -> &'static RecipeInfo {
        &CHANGE_SCHEDULE_INTERVAL
    }

    fn applies_to(&self, path: &Path) -> bool {
        source::is_dependabot(path)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = self.ecosystem_pattern() {
            errors.push(format!("package-ecosystem is not a valid pattern: {}", e));
        }
        if !INTERVALS.contains(&self.interval.as_str()) {
            errors.push(format!(
                "interval '{}' must be one of {}",
                self.interval,
                INTERVALS.join(", ")
            ));
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Ok(pattern) = self.ecosystem_pattern() else {
            return;
        };
        for_each_update(doc, &mut |path, update| {
            let matches = update
                .get("package-ecosystem")
                .and_then(scalar_text)
                .is_some_and(|eco| pattern.is_match(&eco));
            if !matches {
                return;
            }
            let Some(slot) = update
                .get_mut("schedule")
                .and_then(|s| s.get_mut("interval"))
            else {
                return;
            };
            let current = scalar_text(slot).unwrap_or_default();
            if current == self.interval {
                return;
            }
            *slot = Value::String(self.interval.clone());
            ctx.edited(
                &path.key("schedule").key("interval"),
                format!("{} -> {}", current, self.interval),
            );
        });
    }
}

// ============================================================================
// add-dependabot-cooldown
// ============================================================================

pub static ADD_COOLDOWN: RecipeInfo = RecipeInfo {
    name: "add-dependabot-cooldown",
    display_name: "Add cooldown periods to Dependabot configuration",
    description: "Delay version updates until a release has been public for a number of days.",
    options: &[
        "cooldown-days: default delay in days, 1-90 (default 7)",
        "semver-major-days / semver-minor-days / semver-patch-days: per-level delay, 1-90",
        "include: up to 150 dependency patterns the cooldown applies to",
        "exclude: up to 150 dependency patterns exempt from the cooldown",
    ],
};

const MAX_COOLDOWN_DAYS: u32 = 90;
const MAX_PATTERNS: usize = 150;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AddCooldown {
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,
    #[serde(default)]
    pub semver_major_days: Option<u32>,
    #[serde(default)]
    pub semver_minor_days: Option<u32>,
    #[serde(default)]
    pub semver_patch_days: Option<u32>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

fn default_cooldown_days() -> u32 {
    7
}

impl Default for AddCooldown {
    fn default() -> Self {
        Self {
            cooldown_days: default_cooldown_days(),
            semver_major_days: None,
            semver_minor_days: None,
            semver_patch_days: None,
            include: None,
            exclude: None,
        }
    }
}

impl AddCooldown {
    fn cooldown(&self) -> Mapping {
        let mut m = Mapping::new();
        m.insert("default-days".into(), self.cooldown_days.into());
        for (key, days) in [
            ("semver-major-days", self.semver_major_days),
            ("semver-minor-days", self.semver_minor_days),
            ("semver-patch-days", self.semver_patch_days),
        ] {
            if let Some(days) = days {
                m.insert(key.into(), days.into());
            }
        }
        for (key, list) in [("include", &self.include), ("exclude", &self.exclude)] {
            if let Some(list) = list.as_ref().filter(|l| !l.is_empty()) {
                let items = list.iter().map(|s| Value::String(s.clone())).collect();
                m.insert(key.into(), Value::Sequence(items));
            }
        }
        m
    }
}

impl Recipe for AddCooldown {
    fn info(&self) -> &'static RecipeInfo {
        &ADD_COOLDOWN
    }

    fn applies_to(&self, path: &Path) -> bool {
        source::is_dependabot(path)
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let days = [
            ("cooldown-days", Some(self.cooldown_days)),
            ("semver-major-days", self.semver_major_days),
            ("semver-minor-days", self.semver_minor_days),
            ("semver-patch-days", self.semver_patch_days),
        ];
        for (field, value) in days {
            if let Some(d) = value {
                if !(1..=MAX_COOLDOWN_DAYS).contains(&d) {
                    errors.push(format!("{} must be between 1 and {}", field, MAX_COOLDOWN_DAYS));
                }
            }
        }
        for (field, list) in [("include", &self.include), ("exclude", &self.exclude)] {
            if list.as_ref().is_some_and(|l| l.len() > MAX_PATTERNS) {
                errors.push(format!("{} list limited to {} items", field, MAX_PATTERNS));
            }
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_update(doc, &mut |path, update| {
            if !update.contains_key("package-ecosystem") || update.contains_key("cooldown") {
                return;
            }
            update.insert("cooldown".into(), Value::Mapping(self.cooldown()));
            ctx.edited(
                &path.key("cooldown"),
                format!("cooldown of {} days", self.cooldown_days),
            );
        });
    }
}
