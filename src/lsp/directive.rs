//! Runner directive — which schema a document is written against.
//!
//! ```text
//! /// runner: obj_enemy_runner
//! ```
//!
//! The directive may appear on any line; the first one wins. Documents
//! without one use the configured default runner.

use std::sync::LazyLock;

use regex::Regex;

static RUNNER_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^///?[ \t]*runner:[ \t]*(.+?)\s*$").expect("runner directive pattern is valid")
});

/// Runner id named by the first directive in `text`, if any.
pub fn find_runner(text: &str) -> Option<&str> {
    RUNNER_DIRECTIVE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|id| !id.is_empty())
}

/// Runner id for `text`, falling back to `default`.
pub fn runner_id<'a>(text: &'a str, default: &'a str) -> &'a str {
    find_runner(text).unwrap_or(default)
}
