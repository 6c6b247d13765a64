//! ghrewrite: rule-based rewrites for GitHub Actions workflows and
//! Dependabot configuration.
//!
//! Recipes are typed, declarative edits (retarget an action, bump a
//! `setup-java` version, add a Dependabot cooldown, ...) applied in order
//! to every matching YAML file under a repository root. Files no recipe
//! changes are never touched. Rewrites are atomic and hashed with BLAKE3.

pub mod cli;
pub mod core;
pub mod recipes;
pub mod tripwire;
