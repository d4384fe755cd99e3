//! Resolved settings consumed by the core
//!
//! The host resolves configuration files and environment; the core only
//! receives the final record. Every field has a default so a bare
//! `Settings::default()` yields a working store.

use serde::{Deserialize, Serialize};

/// Top-level settings record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub chunks: ChunkSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

/// Settings for the memory corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Maximum memories injected as first-message context
    #[serde(default = "default_max_inject")]
    pub max_inject: usize,
    /// Default result cap for searches
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Whether trigger-phrase detection runs on chat messages
    #[serde(default = "default_true")]
    pub keyword_detection: bool,
    /// Extra trigger phrases merged with the built-in set
    #[serde(default)]
    pub custom_keywords: Vec<String>,
}

/// Settings for the session history corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSettings {
    /// Advisory cap on serialized chunk content; content is stored verbatim
    #[serde(default = "default_max_content_size")]
    pub max_content_size: usize,
    /// Advisory cap on chunks considered per compaction
    #[serde(default = "default_max_compaction_context")]
    pub max_compaction_context: usize,
    /// Reserved: age after which chunks become eligible for archival
    #[serde(default = "default_auto_archive_days")]
    pub auto_archive_days: u32,
}

/// Search backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub mode: SearchMode,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: SearchMode::Fts,
        }
    }
}

/// Search mode; unknown values fall back to full-text search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    #[serde(other)]
    Fts,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_inject: default_max_inject(),
            max_search_results: default_max_search_results(),
            keyword_detection: true,
            custom_keywords: Vec::new(),
        }
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            max_content_size: default_max_content_size(),
            max_compaction_context: default_max_compaction_context(),
            auto_archive_days: default_auto_archive_days(),
        }
    }
}

fn default_max_inject() -> usize {
    5
}

fn default_max_search_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_content_size() -> usize {
    100_000
}

fn default_max_compaction_context() -> usize {
    20
}

fn default_auto_archive_days() -> u32 {
    30
}
