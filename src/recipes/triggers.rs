//! Recipes that edit a workflow's `on:` block.
//!
//! `on` comes in three shapes: a single event name, a sequence of names, or
//! a mapping of event to configuration. Recipes that need to add an event
//! normalize the first two into a mapping (`event: null`) before inserting.

use super::cron;
use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::YamlPath;
use crate::core::source;
use rand::Rng;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::cell::OnceCell;
use std::path::Path;

/// Whether `on` already lists `event`, in any of its shapes.
fn has_event(on: &Value, event: &str) -> bool {
    match on {
        Value::String(s) => s == event,
        Value::Sequence(items) => items.iter().any(|i| i.as_str() == Some(event)),
        Value::Mapping(m) => m.contains_key(event),
        _ => false,
    }
}

/// Turn `on` into a mapping. Returns `None` for shapes that cannot be
/// normalized (null, numbers, nested sequences).
fn on_as_mapping(on: &mut Value) -> Option<&mut Mapping> {
    let normalized = match on {
        Value::Mapping(_) => None,
        Value::String(s) => {
            let mut m = Mapping::new();
            m.insert(Value::String(s.clone()), Value::Null);
            Some(m)
        }
        Value::Sequence(items) => {
            let mut m = Mapping::new();
            for item in items.iter() {
                let name = item.as_str()?;
                m.insert(Value::String(name.to_string()), Value::Null);
            }
            Some(m)
        }
        _ => return None,
    };
    if let Some(m) = normalized {
        *on = Value::Mapping(m);
    }
    on.as_mapping_mut()
}

/// Add `event: value` to `on` unless the event is already present.
fn add_event(doc: &mut Value, ctx: &mut VisitContext, event: &str, value: Value) {
    let Some(on) = doc.get_mut("on") else {
        return;
    };
    if has_event(on, event) {
        return;
    }
    let Some(events) = on_as_mapping(on) else {
        return;
    };
    events.insert(Value::String(event.to_string()), value);
    ctx.edited(&YamlPath::root().key("on").key(event), format!("added {}", event));
}

// ============================================================================
// add-cron-trigger
// ============================================================================

pub static ADD_CRON_TRIGGER: RecipeInfo = RecipeInfo {
    name: "add-cron-trigger",
    display_name: "Add cron workflow trigger",
    description: "Schedule a workflow to also run periodically. Macros like @daily resolve to a \
                  randomized concrete time.",
    options: &[
        "cron: five-field expression, or one of @hourly @daily @weekly @weekdays @weekends \
         @monthly @yearly",
        "workflow-file-matcher: file-name glob within .github/workflows (default: all)",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AddCronTrigger {
    pub cron: String,

    #[serde(default)]
    pub workflow_file_matcher: Option<String>,

    /// Macro resolution, fixed on first use so every file gets the same time.
    #[serde(skip)]
    resolved: OnceCell<String>,
}

impl AddCronTrigger {
    pub fn new(cron: impl Into<String>, workflow_file_matcher: Option<String>) -> Self {
        Self {
            cron: cron.into(),
            workflow_file_matcher,
            resolved: OnceCell::new(),
        }
    }

    /// The concrete expression, resolving a macro with `rng` if this is the
    /// first call.
    pub fn resolve_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.resolved
            .get_or_init(|| cron::resolve(self.cron.trim(), rng))
    }

    pub fn expression(&self) -> &str {
        self.resolve_with(&mut rand::thread_rng())
    }
}

impl Recipe for AddCronTrigger {
    fn info(&self) -> &'static RecipeInfo {
        &ADD_CRON_TRIGGER
    }

    fn applies_to(&self, path: &Path) -> bool {
        source::is_workflow_named(path, self.workflow_file_matcher.as_deref())
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = cron::validate(&self.cron) {
            errors.push(e);
        }
        if let Some(glob) = &self.workflow_file_matcher {
            if let Err(e) = source::validate_glob(glob) {
                errors.push(e);
            }
        }
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let mut entry = Mapping::new();
        entry.insert("cron".into(), Value::String(self.expression().to_string()));
        add_event(
            doc,
            ctx,
            "schedule",
            Value::Sequence(vec![Value::Mapping(entry)]),
        );
    }
}

// ============================================================================
// remove-all-cron-triggers
// ============================================================================

pub static REMOVE_ALL_CRON_TRIGGERS: RecipeInfo = RecipeInfo {
    name: "remove-all-cron-triggers",
    display_name: "Remove all cron triggers",
    description: "Remove the `on.schedule` block from every workflow.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveAllCronTriggers {}

impl Recipe for RemoveAllCronTriggers {
    fn info(&self) -> &'static RecipeInfo {
        &REMOVE_ALL_CRON_TRIGGERS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Some(on) = doc.get_mut("on").and_then(Value::as_mapping_mut) else {
            return;
        };
        if on.shift_remove("schedule").is_some() {
            ctx.edited(&YamlPath::root().key("on").key("schedule"), "removed schedule");
        }
    }
}

// ============================================================================
// add-manual-trigger
// ============================================================================

pub static ADD_MANUAL_TRIGGER: RecipeInfo = RecipeInfo {
    name: "add-manual-trigger",
    display_name: "Add manual workflow trigger",
    description: "Allow a workflow to be started by hand by adding `workflow_dispatch`.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddManualTrigger {}

impl Recipe for AddManualTrigger {
    fn info(&self) -> &'static RecipeInfo {
        &ADD_MANUAL_TRIGGER
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        add_event(doc, ctx, "workflow_dispatch", Value::Null);
    }
}
