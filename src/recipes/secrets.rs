//! Secret renames and `secrets: inherit`.

use super::{Recipe, RecipeInfo, VisitContext};
use crate::core::document::{for_each_job_mut, for_each_string_mut, key_text, YamlPath};
use crate::core::source;
use regex::{NoExpand, Regex};
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// `${{ secrets.NAME }}` with any whitespace inside the braces.
fn secret_reference(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\$\{{\{{\s*secrets\.{}\s*\}}\}}", regex::escape(name)))
}

/// Files targeted by an optional `file-matcher`, defaulting to workflows.
fn matches_file(path: &Path, file_matcher: Option<&str>) -> bool {
    match file_matcher.map(str::trim).filter(|g| !g.is_empty()) {
        Some(glob) => source::matches_glob(path, glob),
        None => source::is_workflow(path),
    }
}

fn validate_matcher(errors: &mut Vec<String>, file_matcher: Option<&str>) {
    if let Some(glob) = file_matcher {
        if let Err(e) = source::validate_glob(glob) {
            errors.push(e);
        }
    }
}

// ============================================================================
// replace-secrets
// ============================================================================

pub static REPLACE_SECRETS: RecipeInfo = RecipeInfo {
    name: "replace-secrets",
    display_name: "Replace GitHub Action secret names",
    description: "Replace references to a secret in workflow files.",
    options: &[
        "old-secret-name: secret to replace, e.g. OSSRH_S01_USERNAME",
        "new-secret-name: new secret name, e.g. SONATYPE_USERNAME",
        "file-matcher: path glob (default .github/workflows/*.yml)",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReplaceSecrets {
    pub old_secret_name: String,
    pub new_secret_name: String,
    #[serde(default)]
    pub file_matcher: Option<String>,
}

impl Recipe for ReplaceSecrets {
    fn info(&self) -> &'static RecipeInfo {
        &REPLACE_SECRETS
    }

    fn applies_to(&self, path: &Path) -> bool {
        matches_file(path, self.file_matcher.as_deref())
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.old_secret_name.trim().is_empty() || self.new_secret_name.trim().is_empty() {
            errors.push("secret names must not be empty".to_string());
        }
        validate_matcher(&mut errors, self.file_matcher.as_deref());
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        let Ok(pattern) = secret_reference(&self.old_secret_name) else {
            return;
        };
        let replacement = format!("${{{{ secrets.{} }}}}", self.new_secret_name);
        for_each_string_mut(doc, &mut |path, text| {
            if !pattern.is_match(text) {
                return;
            }
            let next = pattern.replace_all(text, NoExpand(&replacement)).into_owned();
            if next != *text {
                *text = next;
                ctx.edited(
                    path,
                    format!("secrets.{} -> secrets.{}", self.old_secret_name, self.new_secret_name),
                );
            }
        });
    }
}

// ============================================================================
// replace-secret-keys
// ============================================================================

pub static REPLACE_SECRET_KEYS: RecipeInfo = RecipeInfo {
    name: "replace-secret-keys",
    display_name: "Replace secret key names in GitHub Actions",
    description: "Rename mapping keys used to pass secrets, keeping their position.",
    options: &[
        "old-key-name: key to rename, e.g. ossrh_username",
        "new-key-name: new key, e.g. sonatype_username",
        "file-matcher: path glob (default .github/workflows/*.yml)",
    ],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReplaceSecretKeys {
    pub old_key_name: String,
    pub new_key_name: String,
    #[serde(default)]
    pub file_matcher: Option<String>,
}

impl ReplaceSecretKeys {
    fn rename(&self, node: &mut Value, path: &YamlPath, ctx: &mut VisitContext) {
        match node {
            Value::Mapping(mapping) => {
                let has_old = mapping.contains_key(self.old_key_name.as_str());
                if has_old && mapping.contains_key(self.new_key_name.as_str()) {
                    tracing::warn!(
                        file = %ctx.path.display(),
                        location = %path,
                        "not renaming {}: {} already present",
                        self.old_key_name,
                        self.new_key_name
                    );
                } else if has_old {
                    let entries = std::mem::take(mapping);
                    *mapping = entries
                        .into_iter()
                        .map(|(k, v)| {
                            if k.as_str() == Some(self.old_key_name.as_str()) {
                                (Value::String(self.new_key_name.clone()), v)
                            } else {
                                (k, v)
                            }
                        })
                        .collect::<Mapping>();
                    ctx.edited(
                        &path.key(&self.new_key_name),
                        format!("key {} -> {}", self.old_key_name, self.new_key_name),
                    );
                }
                for (key, value) in mapping.iter_mut() {
                    let child = path.key(&key_text(key));
                    self.rename(value, &child, ctx);
                }
            }
            Value::Sequence(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    self.rename(item, &path.index(i), ctx);
                }
            }
            _ => {}
        }
    }
}

impl Recipe for ReplaceSecretKeys {
    fn info(&self) -> &'static RecipeInfo {
        &REPLACE_SECRET_KEYS
    }

    fn applies_to(&self, path: &Path) -> bool {
        matches_file(path, self.file_matcher.as_deref())
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.old_key_name.trim().is_empty() || self.new_key_name.trim().is_empty() {
            errors.push("key names must not be empty".to_string());
        }
        if self.old_key_name == self.new_key_name {
            errors.push("old-key-name and new-key-name are the same".to_string());
        }
        validate_matcher(&mut errors, self.file_matcher.as_deref());
        errors
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        if self.old_key_name == self.new_key_name {
            return;
        }
        self.rename(doc, &YamlPath::root(), ctx);
    }
}

// ============================================================================
// prefer-secrets-inherit-workflow
// ============================================================================

pub static PREFER_SECRETS_INHERIT: RecipeInfo = RecipeInfo {
    name: "prefer-secrets-inherit-workflow",
    display_name: "Use `secrets: inherit` if possible",
    description: "Pass all secrets to a reusable workflow using `secrets: inherit` when every \
                  secret is forwarded under its own name.",
    options: &[],
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferSecretsInherit {}

/// Every entry is `KEY: ${{ secrets.KEY }}`.
fn forwards_unchanged(secrets: &Mapping) -> bool {
    !secrets.is_empty()
        && secrets.iter().all(|(key, value)| {
            let (Some(key), Some(value)) = (key.as_str(), value.as_str()) else {
                return false;
            };
            secret_reference(key)
                .map(|re| {
                    re.find(value)
                        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
                })
                .unwrap_or(false)
        })
}

impl Recipe for PreferSecretsInherit {
    fn info(&self) -> &'static RecipeInfo {
        &PREFER_SECRETS_INHERIT
    }

    fn visit(&self, doc: &mut Value, ctx: &mut VisitContext) {
        for_each_job_mut(doc, &mut |_, path, job| {
            let Some(secrets) = job.get_mut("secrets") else {
                return;
            };
            if !secrets.as_mapping().is_some_and(forwards_unchanged) {
                return;
            }
            *secrets = Value::String("inherit".to_string());
            ctx.edited(&path.key("secrets"), "secrets: inherit");
        });
    }
}
