//! Core logic: config parsing, document model, file discovery, planning, execution.

pub mod document;
pub mod error;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod source;
pub mod types;
pub mod version;
