//! High-level operations over the memory corpus

use crate::config::Settings;
use crate::detect;
use crate::error::Result;
use crate::search;
use crate::storage::memory_repo::{self, CreateMemoryInput, ListMemoryOptions, UpdateMemoryInput};
use crate::storage::Storage;
use crate::types::{Memory, MemorySource, MemoryType};

/// Options for a memory search
#[derive(Debug, Clone, Default)]
pub struct MemorySearchOptions {
    /// Result cap; defaults to `memory.max_search_results`
    pub limit: Option<usize>,
    pub memory_type: Option<MemoryType>,
}

/// Facade over the memory repository and search layer
#[derive(Clone)]
pub struct MemoryService {
    storage: Storage,
    settings: Settings,
}

impl MemoryService {
    pub fn new(storage: Storage, settings: Settings) -> Self {
        Self { storage, settings }
    }

    /// Store a new memory
    pub fn add(
        &self,
        content: impl Into<String>,
        memory_type: MemoryType,
        tags: Option<Vec<String>>,
        source: Option<MemorySource>,
    ) -> Result<Memory> {
        let input = CreateMemoryInput {
            content: content.into(),
            memory_type,
            tags,
            source,
        };
        self.storage
            .with_connection(|conn| memory_repo::create_memory(conn, &input))
    }

    /// Ranked search; lower rank means a better match
    pub fn search(
        &self,
        query: &str,
        options: &MemorySearchOptions,
    ) -> Result<Vec<(Memory, f64)>> {
        let limit = options
            .limit
            .unwrap_or(self.settings.memory.max_search_results) as i64;
        self.storage.with_connection(|conn| {
            search::search_memories(conn, query, limit, options.memory_type)
        })
    }

    /// Best matches for first-message context injection
    ///
    /// Queries shorter than 2 characters after trimming yield nothing.
    pub fn search_relevant(&self, query: &str) -> Result<Vec<Memory>> {
        if query.trim().chars().count() < 2 {
            return Ok(Vec::new());
        }
        let limit = self.settings.memory.max_inject as i64;
        let ranked = self
            .storage
            .with_connection(|conn| search::search_memories(conn, query, limit, None))?;
        Ok(ranked.into_iter().map(|(memory, _)| memory).collect())
    }

    pub fn list(&self, options: &ListMemoryOptions) -> Result<Vec<Memory>> {
        self.storage
            .with_connection(|conn| memory_repo::list_memories(conn, options))
    }

    pub fn get(&self, memory_id: &str) -> Result<Option<Memory>> {
        self.storage
            .with_connection(|conn| memory_repo::get_memory(conn, memory_id))
    }

    pub fn update(&self, memory_id: &str, input: &UpdateMemoryInput) -> Result<Option<Memory>> {
        self.storage
            .with_connection(|conn| memory_repo::update_memory(conn, memory_id, input))
    }

    /// Delete a memory; false when it was already gone
    pub fn forget(&self, memory_id: &str) -> Result<bool> {
        self.storage
            .with_connection(|conn| memory_repo::delete_memory(conn, memory_id))
    }

    pub fn count(&self, memory_type: Option<MemoryType>) -> Result<i64> {
        self.storage
            .with_connection(|conn| memory_repo::count_memories(conn, memory_type))
    }

    /// Test a chat message for trigger phrases
    ///
    /// Always false when detection is disabled in settings.
    pub fn detect_keyword(&self, text: &str) -> bool {
        if !self.settings.memory.keyword_detection {
            return false;
        }
        detect::detect_keyword(text, &self.settings.memory.custom_keywords)
    }
}
