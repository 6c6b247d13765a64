//! Tool-version strings as written in `with.java-version` / `with.node-version`.
//!
//! Only plain numeric versions are understood: `17`, `11.0.17`,
//! `15.0.0-ea.2`, `20.1+build`. Anything else (expressions, ranges, aliases
//! like `lts/*`) is not a version we will touch.

use regex::Regex;
use std::sync::LazyLock;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)(\.[0-9]+)*([-+].*)?$").expect("version regex is valid")
});

/// Major component of a version string, or `None` when the string is not a
/// clean version or the major does not fit in a `u32`.
pub fn parse_major(version: &str) -> Option<u32> {
    let caps = VERSION_PATTERN.captures(version)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Replacement text for `current` if its major is strictly below `minimum`.
pub fn upgrade_major(current: &str, minimum: u32) -> Option<String> {
    match parse_major(current) {
        Some(major) if major < minimum => Some(minimum.to_string()),
        _ => None,
    }
}
