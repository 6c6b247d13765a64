//! Run configuration parsing and validation.
//!
//! Parses ghrewrite.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Name must not be empty
//! - At least one recipe
//! - Each recipe's own parameter checks
//!
//! Unknown recipes and unknown recipe fields are rejected by serde at parse
//! time.

use super::error::{Error, Result};
use super::types::RewriteConfig;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a ghrewrite.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<RewriteConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a ghrewrite.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<RewriteConfig> {
    serde_yaml_ng::from_str(yaml).map_err(Error::ConfigParse)
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &RewriteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    if config.name.trim().is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    if config.recipes.is_empty() {
        errors.push(ValidationError {
            message: "recipes must list at least one recipe".to_string(),
        });
    }

    for (i, spec) in config.recipes.iter().enumerate() {
        for problem in spec.recipe().validate() {
            errors.push(ValidationError {
                message: format!("recipes[{}] ({}): {}", i, spec.name(), problem),
            });
        }
    }

    errors
}

/// Parse and validate in one step, failing on the first invalid config.
pub fn load_config(path: &Path) -> Result<RewriteConfig> {
    let config = parse_config_file(path)?;
    let errors = validate_config(&config);
    if !errors.is_empty() {
        for e in &errors {
            tracing::error!("{}", e);
        }
        return Err(Error::Validation(errors.len()));
    }
    Ok(config)
}
