//! Workflow inputs: arguments passed to reusable workflows, and
//! `workflow_dispatch` inputs declared by a workflow.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{collect_strings, get_str, key_text, YamlPath};
use regex::Regex;
use serde::Deserialize;
use serde_yaml_ng::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

// ============================================================================
// remove-workflow-input-argument
// ============================================================================

pub static REMOVE_WORKFLOW_INPUT_ARGUMENT: RecipeInfo = RecipeInfo {
    name: "remove-workflow-input-argument",
    display_name: "Remove workflow input argument",
    description: "Remove an input argument from calls to a specific reusable workflow version.",
    options: &[
        "workflow-reference: e.g. org/repo/.github/workflows/build.yml",
        "version: e.g. v1.2.3",
        "input-argument-name: input to drop from `with`",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RemoveWorkflowInputArgument {
    pub workflow_reference: String,
    pub version: String,
    pub input_argument_name: String,
}

impl RemoveWorkflowInputArgument {
    fn walk(&self, node: &mut Value, path: &YamlPath, target: &str, ctx: &mut VisitContext) {
        match node {
            Value::Mapping(mapping) => {
                if get_str(mapping, "uses") == Some(target) {
                    let emptied = match mapping.get_mut("with").and_then(Value::as_mapping_mut) {
                        Some(with) => {
                            if with.shift_remove(self.input_argument_name.as_str()).is_some() {
                                ctx.edited(
                                    &path.key("with").key(&self.input_argument_name),
                                    format!("removed input {}", self.input_argument_name),
                                );
                            }
                            with.is_empty()
                        }
                        None => false,
                    };
                    if emptied {
                        mapping.shift_remove("with");
                    }
                }
                for (key, value) in mapping.iter_mut() {
                    let child = path.key(&key_text(key));
                    self.walk(value, &child, target, ctx);
                }
            }
            Value::Sequence(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    self.walk(item, &path.index(i), target, ctx);
                }
            }
            _ => {}
        }
    }
}

impl Recipe for RemoveWorkflowInputArgument {
    fn info(&self) -> &'static RecipeInfo {
        &REMOVE_WORKFLOW_INPUT_ARGUMENT
    }

    fn validate(&self) -> Vec<String> {
        [
            ("workflow-reference", &self.workflow_reference),
            ("version", &self.version),
            ("input-argument-name", &self.input_argument_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| format!("{} must not be empty", field))
        .collect()
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let target = format!("{}@{}", self.workflow_reference, self.version);
        self.walk(doc, &YamlPath::root(), &target, ctx);
    }
}

// ============================================================================
// remove-unused-workflow-dispatch-inputs
// ============================================================================

pub static REMOVE_UNUSED_DISPATCH_INPUTS: RecipeInfo = RecipeInfo {
    name: "remove-unused-workflow-dispatch-inputs",
    display_name: "Remove unused workflow dispatch inputs",
    description: "Remove workflow_dispatch inputs that are not referenced anywhere in the workflow.",
    options: &[],
};

static INPUT_USAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"github *\. *event *\. *inputs *\. *([A-Za-z_][A-Za-z0-9_-]*)|inputs *\. *([A-Za-z_][A-Za-z0-9_-]*)",
    )
    .expect("input usage regex is valid")
});

/// Input names referenced by any scalar in the document.
fn used_inputs(doc: &Value) -> HashSet<String> {
    let mut strings = Vec::new();
    collect_strings(doc, &mut strings);
    strings
        .iter()
        .flat_map(|s| INPUT_USAGE.captures_iter(s))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveUnusedDispatchInputs {}

impl Recipe for RemoveUnusedDispatchInputs {
    fn info(&self) -> &'static RecipeInfo {
        &REMOVE_UNUSED_DISPATCH_INPUTS
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let used = used_inputs(doc);
        let Some(dispatch) = doc
            .get_mut("on")
            .and_then(|on| on.get_mut("workflow_dispatch"))
        else {
            return;
        };
        let Some(inputs) = dispatch.get_mut("inputs").and_then(Value::as_mapping_mut) else {
            return;
        };

        let base = YamlPath::root()
            .key("on")
            .key("workflow_dispatch")
            .key("inputs");
        let before = inputs.len();
        inputs.retain(|name, _| {
            let name = key_text(name);
            let keep = used.contains(&name);
            if !keep {
                ctx.edited(&base.key(&name), format!("removed unused input {}", name));
            }
            keep
        });
        if inputs.len() == before || !inputs.is_empty() {
            return;
        }

        if let Some(config) = dispatch.as_mapping_mut() {
            config.shift_remove("inputs");
            if config.is_empty() {
                *dispatch = Value::Null;
            }
        }
    }
}
