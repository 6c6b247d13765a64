//! Error type shared by the config loader, planner, executor, and CLI.
//!
//! Recipes themselves never fail: input they do not recognize is left alone.
//! Everything here is about the run around them.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    ConfigParse(#[source] serde_yaml_ng::Error),

    #[error("YAML serialize error in {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("{0} validation error(s)")]
    Validation(usize),

    #[error("unknown recipe '{0}' (see `ghrewrite recipes`)")]
    UnknownRecipe(String),

    #[error("invalid option '{0}': expected key=value")]
    InvalidOption(String),

    #[error("cannot walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("event log {}: {message}", path.display())]
    EventLog { path: PathBuf, message: String },

    #[error("{0} file(s) would be rewritten")]
    Pending(usize),

    #[error("{0} finding(s) reported")]
    Findings(usize),
}
