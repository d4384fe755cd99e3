//! Trigger-phrase detection for chat messages
//!
//! Text inside code is never a trigger: fenced blocks are stripped first,
//! then inline spans, and only the remainder is matched. Matching is
//! case-insensitive with word boundaries on both sides of each phrase, so
//! "remembered" does not fire on "remember".

use once_cell::sync::Lazy;
use regex::Regex;

/// Built-in trigger phrases
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "remember",
    "memorize",
    "save this",
    "note this",
    "keep in mind",
    "don't forget",
    "learn this",
    "store this",
    "record this",
    "make a note",
    "take note",
    "jot down",
    "commit to memory",
    "never forget",
    "always remember",
];

static FENCED_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+?`").unwrap());

static DEFAULT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    build_pattern(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()))
});

/// Remove fenced code blocks, then inline code spans
pub fn strip_code(text: &str) -> String {
    let without_fences = FENCED_CODE.replace_all(text, " ");
    INLINE_CODE.replace_all(&without_fences, " ").into_owned()
}

/// Build a case-insensitive word-boundary union over the given phrases
///
/// Returns `None` for an empty phrase set; `None` never matches.
pub fn build_pattern(keywords: impl IntoIterator<Item = String>) -> Option<Regex> {
    let escaped: Vec<String> = keywords
        .into_iter()
        .filter(|k| !k.trim().is_empty())
        .map(|k| regex::escape(k.trim()))
        .collect();
    if escaped.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
    Some(Regex::new(&pattern).expect("escaped keywords form a valid pattern"))
}

/// Test text against the default phrases plus any extras
pub fn detect_keyword(text: &str, extra_keywords: &[String]) -> bool {
    let cleaned = strip_code(text);

    if extra_keywords.is_empty() {
        return DEFAULT_PATTERN
            .as_ref()
            .map(|p| p.is_match(&cleaned))
            .unwrap_or(false);
    }

    let all = DEFAULT_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .chain(extra_keywords.iter().cloned());
    build_pattern(all)
        .map(|p| p.is_match(&cleaned))
        .unwrap_or(false)
}
