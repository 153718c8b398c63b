//! Error compaction: reduce wrapped error chains to their innermost cause.

use regex::Regex;
use std::sync::OnceLock;

/// Leading segments that only wrap the real error.
const WRAPPER_PHRASES: &[&str] = &[
    "child workflow execution error",
    "activity error",
    "child workflow at depth",
    "leaf workflow failed at depth",
    "timeout workflow failed",
    "retry exhaustion",
    "activityfailed",
    "workflowfailed",
    "childworkflowfailed",
    "timeout",
];

fn pattern(slot: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    slot.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn strip(slot: &'static OnceLock<Option<Regex>>, source: &str, text: &str) -> String {
    match pattern(slot, source) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

static METADATA: OnceLock<Option<Regex>> = OnceLock::new();
static INLINE_METADATA: OnceLock<Option<Regex>> = OnceLock::new();
static ACTIVITY_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();

/// Innermost informative segment of a `: `-separated error chain, with
/// parenthetical metadata removed.
pub fn compact_error(message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }

    let trimmed = message
        .strip_prefix("WorkflowFailed: ")
        .unwrap_or(message);
    let trimmed = trimmed.strip_prefix("Timeout: ").unwrap_or(trimmed);
    let cleaned = strip(
        &METADATA,
        r"\s*\([^)]*(?:type:|workflowID:|runID:|initiatedEventID:|startedEventID:|scheduledEventID:|identity:|retryable:)[^)]*\)",
        trimmed,
    );

    let segments: Vec<&str> = cleaned.split(": ").collect();
    let core = segments
        .iter()
        .rev()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .find(|s| {
            let lower = s.to_lowercase();
            !WRAPPER_PHRASES.iter().any(|p| lower.starts_with(p))
        })
        .or_else(|| segments.last().map(|s| s.trim()))
        .unwrap_or_default();

    let core = strip(
        &INLINE_METADATA,
        r"\s*\(type:\s*\w+(?:,\s*retryable:\s*\w+)?\)",
        core,
    );
    let core = strip(&ACTIVITY_PREFIX, r"^[A-Z][a-zA-Z]+Activity\s*-\s*", &core);
    core.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`compact_error`] with a short prefix for timeouts.
pub fn compact_error_with_context(message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }
    let core = compact_error(message);
    let lower = message.to_lowercase();

    if lower.contains("activity")
        && lower.contains("timeout")
        && !core.to_lowercase().contains("timeout")
    {
        return format!("activity timeout: {core}");
    }
    if lower.contains("workflow execution timed out") {
        return "workflow timeout".to_string();
    }
    core
}
