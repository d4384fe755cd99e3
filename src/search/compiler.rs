//! Free-text to FTS5 match-expression compiler
//!
//! FTS5 interprets quotes, parentheses, `*`, column filters, and the
//! AND/OR/NOT/NEAR operators. User text is never passed through: it is
//! re-tokenized into word runs, each run quoted, and the runs joined with
//! OR. The output contains no operator a user could smuggle in.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

const RESERVED_WORDS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Compile user text into a safe FTS5 match expression
///
/// Word runs shorter than 2 characters and the reserved operator words are
/// dropped. Returns `None` when nothing searchable remains; callers answer
/// that with an empty result set instead of running a query.
pub fn compile_match_query(input: &str) -> Option<String> {
    let terms: Vec<String> = WORD_RUNS
        .find_iter(input)
        .map(|m| m.as_str())
        .filter(|run| run.chars().count() >= 2)
        .filter(|run| !RESERVED_WORDS.iter().any(|op| op.eq_ignore_ascii_case(run)))
        .map(|run| format!("\"{}\"", run))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}
