//! High-level operations over the session history corpus

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::search;
use crate::storage::chunk_repo::{self, CreateChunkInput, UpdateChunkInput};
use crate::storage::tree::{self, CompactResult};
use crate::storage::Storage;
use crate::tracker::MessageTracker;
use crate::types::{Chunk, ChunkContent, ChunkMetadata, MessagePart};

/// Options for a chunk search
#[derive(Debug, Clone, Default)]
pub struct ChunkSearchOptions {
    pub session_id: Option<String>,
    /// Inclusive minimum depth; 1 restricts results to summaries
    pub min_depth: Option<i64>,
    /// Result cap; defaults to `memory.max_search_results`
    pub limit: Option<usize>,
}

/// Facade over the chunk repository, tree engine, and tracker
#[derive(Clone)]
pub struct ChunkService {
    storage: Storage,
    tracker: Arc<MessageTracker>,
    settings: Settings,
}

impl ChunkService {
    pub fn new(storage: Storage, tracker: Arc<MessageTracker>, settings: Settings) -> Self {
        Self {
            storage,
            tracker,
            settings,
        }
    }

    pub fn tracker(&self) -> &MessageTracker {
        &self.tracker
    }

    /// Persist a chunk directly
    pub fn create(&self, session_id: &str, content: ChunkContent) -> Result<Chunk> {
        self.storage.with_connection(|conn| {
            chunk_repo::create_chunk(conn, &CreateChunkInput::leaf(session_id, content))
        })
    }

    /// Convert the session's buffered messages into a persisted leaf chunk
    ///
    /// Returns `None` when nothing is buffered. On success the buffer is
    /// cleared and the tracker's current chunk id points at the new chunk.
    pub fn finalize(&self, session_id: &str) -> Result<Option<Chunk>> {
        let tracked = self.tracker.get_messages(session_id);
        if tracked.is_empty() {
            return Ok(None);
        }

        let mut tools_used: Vec<String> = Vec::new();
        let mut files_modified: Vec<String> = Vec::new();
        for message in &tracked {
            for part in &message.parts {
                match &part.part {
                    MessagePart::Tool { tool, .. } => {
                        if !tools_used.contains(tool) {
                            tools_used.push(tool.clone());
                        }
                    }
                    MessagePart::File { text } => {
                        if !files_modified.contains(text) {
                            files_modified.push(text.clone());
                        }
                    }
                    _ => {}
                }
            }
        }

        let content = ChunkContent {
            messages: tracked
                .into_iter()
                .map(|m| m.into_chunk_message())
                .collect(),
            metadata: ChunkMetadata {
                tools_used: (!tools_used.is_empty()).then_some(tools_used),
                files_modified: (!files_modified.is_empty()).then_some(files_modified),
                outcome: None,
            },
        };

        let chunk = self.storage.with_connection(|conn| {
            let created =
                chunk_repo::create_chunk(conn, &CreateChunkInput::leaf(session_id, content))?;
            chunk_repo::update_chunk(
                conn,
                &created.id,
                &UpdateChunkInput {
                    finalized_at: Some(chrono::Utc::now().timestamp()),
                    ..Default::default()
                },
            )?
            .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
        })?;

        self.tracker.clear_messages(session_id);
        self.tracker.set_current_chunk_id(session_id, &chunk.id);

        tracing::debug!(
            session = session_id,
            chunk = %chunk.id,
            messages = chunk.content.messages.len(),
            "finalized session messages"
        );
        Ok(Some(chunk))
    }

    /// Compact every active chunk of a session under a new summary
    ///
    /// Returns `None` when the session has no active chunks. The children
    /// are absorbed in chronological order.
    pub fn compact(&self, session_id: &str, summary: &str) -> Result<Option<CompactResult>> {
        let active = self
            .storage
            .with_connection(|conn| chunk_repo::get_active_chunks(conn, session_id))?;
        if active.is_empty() {
            return Ok(None);
        }

        let chunk_ids: Vec<String> = active.into_iter().map(|c| c.id).collect();
        let result = tree::compact(&self.storage, session_id, &chunk_ids, summary)?;
        Ok(Some(result))
    }

    /// A chunk by itself, or with its whole subtree
    ///
    /// With children the start chunk comes first, then descendants level by
    /// level. Returns `None` when the chunk does not exist.
    pub fn expand(&self, chunk_id: &str, include_children: bool) -> Result<Option<Vec<Chunk>>> {
        if !include_children {
            return Ok(self
                .storage
                .with_connection(|conn| chunk_repo::get_chunk(conn, chunk_id))?
                .map(|chunk| vec![chunk]));
        }

        let rows = self
            .storage
            .with_connection(|conn| tree::descendants(conn, chunk_id))?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(|row| row.chunk).collect()))
    }

    /// Ranked search over chunk content and summaries
    pub fn search(&self, query: &str, options: &ChunkSearchOptions) -> Result<Vec<(Chunk, f64)>> {
        let limit = options
            .limit
            .unwrap_or(self.settings.memory.max_search_results) as i64;
        self.storage.with_connection(|conn| {
            search::search_chunks(
                conn,
                query,
                limit,
                options.session_id.as_deref(),
                options.min_depth,
            )
        })
    }

    pub fn get(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        self.storage
            .with_connection(|conn| chunk_repo::get_chunk(conn, chunk_id))
    }

    pub fn delete(&self, chunk_id: &str) -> Result<bool> {
        self.storage
            .with_connection(|conn| chunk_repo::delete_chunk(conn, chunk_id))
    }

    /// Remove every chunk of a session and its tracker state
    ///
    /// Returns the number of chunks deleted.
    pub fn delete_session(&self, session_id: &str) -> Result<usize> {
        let deleted = self.storage.with_transaction(|conn| {
            let chunks = chunk_repo::get_chunks_by_session(conn, session_id, None)?;
            for chunk in &chunks {
                chunk_repo::delete_chunk(conn, &chunk.id)?;
            }
            Ok(chunks.len())
        })?;
        self.tracker.clear_session(session_id);

        tracing::debug!(session = session_id, deleted, "deleted session chunks");
        Ok(deleted)
    }

    /// Most recent compaction summaries across sessions
    pub fn recent_summary_chunks(&self, limit: Option<usize>) -> Result<Vec<Chunk>> {
        let limit = limit.unwrap_or(5) as i64;
        self.storage
            .with_connection(|conn| chunk_repo::recent_summaries(conn, limit))
    }

    pub fn count(&self, session_id: Option<&str>) -> Result<i64> {
        self.storage
            .with_connection(|conn| chunk_repo::count_chunks(conn, session_id))
    }
}
