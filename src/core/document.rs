//! YAML document model: parsing, rendering, and the traversal helpers that
//! recipes share.
//!
//! Documents are plain `serde_yaml_ng::Value` trees. Mapping order is
//! preserved, so rendering an untouched tree gives back the same structure.

use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Parse every `---`-separated document in `text`.
pub fn parse_documents(text: &str) -> Result<Vec<Value>, serde_yaml_ng::Error> {
    let mut docs = Vec::new();
    for de in serde_yaml_ng::Deserializer::from_str(text) {
        docs.push(Value::deserialize(de)?);
    }
    Ok(docs)
}

/// Render documents back to YAML text.
pub fn render_documents(docs: &[Value]) -> Result<String, serde_yaml_ng::Error> {
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&serde_yaml_ng::to_string(doc)?);
    }
    Ok(out)
}

/// Location of a node, printed JSONPath-style: `$.jobs.build.steps[0].uses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlPath(String);

impl YamlPath {
    pub fn root() -> Self {
        Self("$".to_string())
    }

    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}.{}", self.0, key))
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for YamlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Textual value of a scalar. Numbers and booleans are rendered the way
/// they appear in a workflow (`11`, `true`); non-scalars yield `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Key of a mapping entry as text.
pub fn key_text(key: &Value) -> String {
    scalar_text(key).unwrap_or_else(|| "?".to_string())
}

/// String value of `mapping[key]`, if it is a string scalar.
pub fn get_str<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a str> {
    mapping.get(key).and_then(Value::as_str)
}

/// Follow a chain of mapping keys.
pub fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |node, key| node.get(*key))
}

/// Mutable variant of [`lookup`].
pub fn lookup_mut<'a>(value: &'a mut Value, keys: &[&str]) -> Option<&'a mut Value> {
    keys.iter().try_fold(value, |node, key| node.get_mut(*key))
}

/// Replace a scalar while keeping its kind: a numeric scalar stays numeric
/// when the new text is a number.
pub fn replace_scalar(slot: &mut Value, text: &str) {
    *slot = match slot {
        Value::Number(_) => text
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    };
}

/// Mutable access to `mapping[key]` as a mapping, creating an empty one when
/// the key is absent or null. Returns `None` when the key holds a scalar or
/// sequence.
pub fn child_mapping_mut<'a>(mapping: &'a mut Mapping, key: &str) -> Option<&'a mut Mapping> {
    let absent = matches!(mapping.get(key), None | Some(Value::Null));
    if absent {
        mapping.insert(Value::String(key.to_string()), Value::Mapping(Mapping::new()));
    }
    mapping.get_mut(key).and_then(Value::as_mapping_mut)
}

/// Visit every job mapping under `jobs`.
pub fn for_each_job_mut(doc: &mut Value, f: &mut dyn FnMut(&str, &YamlPath, &mut Mapping)) {
    let Some(jobs) = doc.get_mut("jobs").and_then(Value::as_mapping_mut) else {
        return;
    };
    let base = YamlPath::root().key("jobs");
    for (name, job) in jobs.iter_mut() {
        let name = key_text(name);
        if let Some(job) = job.as_mapping_mut() {
            f(&name, &base.key(&name), job);
        }
    }
}

/// Visit every step mapping found in a `steps` sequence, at any depth.
pub fn for_each_step_mut(doc: &mut Value, f: &mut dyn FnMut(&YamlPath, &mut Mapping)) {
    walk_steps(doc, &YamlPath::root(), f);
}

fn walk_steps(node: &mut Value, path: &YamlPath, f: &mut dyn FnMut(&YamlPath, &mut Mapping)) {
    match node {
        Value::Mapping(mapping) => {
            for (key, value) in mapping.iter_mut() {
                let key = key_text(key);
                let child = path.key(&key);
                if key == "steps" {
                    if let Value::Sequence(steps) = value {
                        for (i, step) in steps.iter_mut().enumerate() {
                            if let Value::Mapping(step) = step {
                                f(&child.index(i), step);
                            }
                        }
                        continue;
                    }
                }
                walk_steps(value, &child, f);
            }
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                walk_steps(item, &path.index(i), f);
            }
        }
        Value::Tagged(tagged) => walk_steps(&mut tagged.value, path, f),
        _ => {}
    }
}

/// Visit every string scalar (values only, not keys).
pub fn for_each_string_mut(node: &mut Value, f: &mut dyn FnMut(&YamlPath, &mut String)) {
    walk_strings(node, &YamlPath::root(), f);
}

fn walk_strings(node: &mut Value, path: &YamlPath, f: &mut dyn FnMut(&YamlPath, &mut String)) {
    match node {
        Value::String(s) => f(path, s),
        Value::Mapping(mapping) => {
            for (key, value) in mapping.iter_mut() {
                let child = path.key(&key_text(key));
                walk_strings(value, &child, f);
            }
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                walk_strings(item, &path.index(i), f);
            }
        }
        Value::Tagged(tagged) => walk_strings(&mut tagged.value, path, f),
        _ => {}
    }
}

/// Visit every mapping entry under `node`, parents before children. The path
/// handed to `f` is the entry's own location.
pub fn for_each_entry(node: &Value, f: &mut dyn FnMut(&YamlPath, &str, &Value)) {
    walk_entries(node, &YamlPath::root(), f);
}

fn walk_entries(node: &Value, path: &YamlPath, f: &mut dyn FnMut(&YamlPath, &str, &Value)) {
    match node {
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                let key = key_text(key);
                let child = path.key(&key);
                f(&child, &key, value);
                walk_entries(value, &child, f);
            }
        }
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_entries(item, &path.index(i), f);
            }
        }
        Value::Tagged(tagged) => walk_entries(&tagged.value, path, f),
        _ => {}
    }
}

/// Collect every string scalar, keys included.
pub fn collect_strings(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(s) => out.push(s.clone()),
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                collect_strings(key, out);
                collect_strings(value, out);
            }
        }
        Value::Sequence(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Tagged(tagged) => collect_strings(&tagged.value, out),
        _ => {}
    }
}

/// True if a mapping key named `key` appears anywhere under `node`.
pub fn contains_key_deep(node: &Value, key: &str) -> bool {
    match node {
        Value::Mapping(mapping) => mapping
            .iter()
            .any(|(k, v)| k.as_str() == Some(key) || contains_key_deep(v, key)),
        Value::Sequence(items) => items.iter().any(|item| contains_key_deep(item, key)),
        Value::Tagged(tagged) => contains_key_deep(&tagged.value, key),
        _ => false,
    }
}
