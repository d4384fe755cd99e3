//! Database queries for chunk rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::id;
use crate::types::{Chunk, ChunkContent, ChunkStatus};

/// Input for creating a chunk
#[derive(Debug, Clone)]
pub struct CreateChunkInput {
    pub session_id: String,
    pub content: ChunkContent,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub summary: Option<String>,
}

impl CreateChunkInput {
    /// A leaf chunk holding the given content
    pub fn leaf(session_id: impl Into<String>, content: ChunkContent) -> Self {
        Self {
            session_id: session_id.into(),
            content,
            parent_id: None,
            depth: 0,
            summary: None,
        }
    }
}

/// Fields to change on an existing chunk; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateChunkInput {
    pub content: Option<ChunkContent>,
    pub summary: Option<String>,
    pub status: Option<ChunkStatus>,
    pub child_refs: Option<Vec<String>>,
    pub finalized_at: Option<i64>,
    pub compacted_at: Option<i64>,
}

impl UpdateChunkInput {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.summary.is_none()
            && self.status.is_none()
            && self.child_refs.is_none()
            && self.finalized_at.is_none()
            && self.compacted_at.is_none()
    }
}

pub(crate) const CHUNK_COLUMNS: &str = "id, session_id, parent_id, depth, child_refs, content, \
                                        summary, status, created_at, finalized_at, compacted_at, \
                                        embedding";

fn decode<T>(idx: usize, result: std::result::Result<T, String>) -> rusqlite::Result<T> {
    result.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Parse a chunk from a database row
pub fn chunk_from_row(row: &Row) -> rusqlite::Result<Chunk> {
    let child_refs_json: Option<String> = row.get(4)?;
    let content_json: String = row.get(5)?;
    let status_str: String = row.get(7)?;

    let child_refs = match child_refs_json {
        Some(json) => Some(decode(
            4,
            serde_json::from_str(&json).map_err(|e| e.to_string()),
        )?),
        None => None,
    };
    let content: ChunkContent = decode(5, serde_json::from_str(&content_json).map_err(|e| e.to_string()))?;
    let status = decode(7, status_str.parse::<ChunkStatus>())?;

    Ok(Chunk {
        id: row.get(0)?,
        session_id: row.get(1)?,
        parent_id: row.get(2)?,
        depth: row.get(3)?,
        child_refs,
        content,
        summary: row.get(6)?,
        status,
        created_at: row.get(8)?,
        finalized_at: row.get(9)?,
        compacted_at: row.get(10)?,
        embedding: row.get(11)?,
    })
}

/// Create a new active chunk
pub fn create_chunk(conn: &Connection, input: &CreateChunkInput) -> Result<Chunk> {
    let chunk_id = id::chunk_id();
    let now = chrono::Utc::now().timestamp();
    let content_json = serde_json::to_string(&input.content)?;

    conn.execute(
        "INSERT INTO chunks (id, session_id, parent_id, depth, child_refs, content, summary,
                             status, created_at, finalized_at, compacted_at)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8, NULL, NULL)",
        params![
            chunk_id,
            input.session_id,
            input.parent_id,
            input.depth,
            content_json,
            input.summary,
            ChunkStatus::Active.as_str(),
            now,
        ],
    )?;

    tracing::debug!(id = %chunk_id, session = %input.session_id, "created chunk");
    get_chunk(conn, &chunk_id)?
        .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
}

/// Fetch a chunk by id
pub fn get_chunk(conn: &Connection, chunk_id: &str) -> Result<Option<Chunk>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM chunks WHERE id = ?1",
        CHUNK_COLUMNS
    ))?;
    let chunk = stmt.query_row(params![chunk_id], chunk_from_row).optional()?;
    Ok(chunk)
}

/// Update the provided fields of a chunk
///
/// Returns `None` when the row is missing; with no fields set, returns the
/// existing row untouched.
pub fn update_chunk(
    conn: &Connection,
    chunk_id: &str,
    input: &UpdateChunkInput,
) -> Result<Option<Chunk>> {
    let Some(existing) = get_chunk(conn, chunk_id)? else {
        return Ok(None);
    };
    if input.is_empty() {
        return Ok(Some(existing));
    }

    let mut fragments: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(content) = &input.content {
        fragments.push("content = ?");
        values.push(Box::new(serde_json::to_string(content)?));
    }
    if let Some(summary) = &input.summary {
        fragments.push("summary = ?");
        values.push(Box::new(summary.clone()));
    }
    if let Some(status) = input.status {
        fragments.push("status = ?");
        values.push(Box::new(status.as_str()));
    }
    if let Some(child_refs) = &input.child_refs {
        fragments.push("child_refs = ?");
        values.push(Box::new(serde_json::to_string(child_refs)?));
    }
    if let Some(finalized_at) = input.finalized_at {
        fragments.push("finalized_at = ?");
        values.push(Box::new(finalized_at));
    }
    if let Some(compacted_at) = input.compacted_at {
        fragments.push("compacted_at = ?");
        values.push(Box::new(compacted_at));
    }

    let sql = format!("UPDATE chunks SET {} WHERE id = ?", fragments.join(", "));
    values.push(Box::new(chunk_id.to_string()));

    let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, value_refs.as_slice())?;

    get_chunk(conn, chunk_id)
}

/// Delete a chunk; false when the row was absent
///
/// Children keep their rows; the FK nulls their `parent_id`.
pub fn delete_chunk(conn: &Connection, chunk_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM chunks WHERE id = ?1", params![chunk_id])?;
    Ok(deleted > 0)
}

/// All chunks of a session in creation order, optionally filtered by status
pub fn get_chunks_by_session(
    conn: &Connection,
    session_id: &str,
    status: Option<ChunkStatus>,
) -> Result<Vec<Chunk>> {
    let chunks = match status {
        Some(status) => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM chunks WHERE session_id = ?1 AND status = ?2
                 ORDER BY created_at ASC, rowid ASC",
                CHUNK_COLUMNS
            ))?;
            let rows = stmt.query_map(params![session_id, status.as_str()], chunk_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM chunks WHERE session_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
                CHUNK_COLUMNS
            ))?;
            let rows = stmt.query_map(params![session_id], chunk_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(chunks)
}

/// Active chunks of a session in creation order
pub fn get_active_chunks(conn: &Connection, session_id: &str) -> Result<Vec<Chunk>> {
    get_chunks_by_session(conn, session_id, Some(ChunkStatus::Active))
}

/// Direct children of a chunk in creation order
pub fn get_children(conn: &Connection, parent_id: &str) -> Result<Vec<Chunk>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM chunks WHERE parent_id = ?1 ORDER BY created_at ASC, rowid ASC",
        CHUNK_COLUMNS
    ))?;
    let rows = stmt.query_map(params![parent_id], chunk_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Count chunks, optionally within one session
pub fn count_chunks(conn: &Connection, session_id: Option<&str>) -> Result<i64> {
    let count = match session_id {
        Some(session_id) => conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?,
    };
    Ok(count)
}

/// Most recent compaction summaries across sessions
pub fn recent_summaries(conn: &Connection, limit: i64) -> Result<Vec<Chunk>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM chunks WHERE depth > 0 AND summary IS NOT NULL
         ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        CHUNK_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit], chunk_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MigrateSet, Storage};
    use crate::types::{ChunkMessage, MessagePart, MessageRole};

    fn storage() -> Storage {
        Storage::open_in_memory(MigrateSet::History).unwrap()
    }

    fn content_with_text(text: &str) -> ChunkContent {
        ChunkContent {
            messages: vec![ChunkMessage {
                id: "m1".to_string(),
                role: MessageRole::User,
                parts: vec![MessagePart::Text {
                    text: text.to_string(),
                }],
                timestamp: 1_700_000_000,
            }],
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_create_defaults() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                let chunk =
                    create_chunk(conn, &CreateChunkInput::leaf("sess-1", content_with_text("hi")))?;
                assert!(chunk.id.starts_with("ch_"));
                assert_eq!(chunk.status, ChunkStatus::Active);
                assert_eq!(chunk.depth, 0);
                assert!(chunk.parent_id.is_none());
                assert!(chunk.child_refs.is_none());
                assert!(chunk.finalized_at.is_none());
                assert!(chunk.compacted_at.is_none());
                assert_eq!(chunk.content.messages.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_update_dynamic_fields() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                let chunk =
                    create_chunk(conn, &CreateChunkInput::leaf("sess-1", content_with_text("hi")))?;
                let updated = update_chunk(
                    conn,
                    &chunk.id,
                    &UpdateChunkInput {
                        summary: Some("what happened".to_string()),
                        finalized_at: Some(1_700_000_100),
                        ..Default::default()
                    },
                )?
                .unwrap();
                assert_eq!(updated.summary.as_deref(), Some("what happened"));
                assert_eq!(updated.finalized_at, Some(1_700_000_100));
                assert_eq!(updated.content, chunk.content);

                let noop = update_chunk(conn, &chunk.id, &UpdateChunkInput::default())?.unwrap();
                assert_eq!(noop, updated);

                assert!(update_chunk(conn, "ch_missing000001", &UpdateChunkInput::default())?
                    .is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_session_and_status_queries() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                let a = create_chunk(conn, &CreateChunkInput::leaf("s1", content_with_text("a")))?;
                let b = create_chunk(conn, &CreateChunkInput::leaf("s1", content_with_text("b")))?;
                create_chunk(conn, &CreateChunkInput::leaf("s2", content_with_text("c")))?;

                update_chunk(
                    conn,
                    &b.id,
                    &UpdateChunkInput {
                        status: Some(ChunkStatus::Compacted),
                        ..Default::default()
                    },
                )?;

                let all = get_chunks_by_session(conn, "s1", None)?;
                assert_eq!(all.len(), 2);
                assert_eq!(all[0].id, a.id);

                let active = get_active_chunks(conn, "s1")?;
                assert_eq!(active.len(), 1);
                assert_eq!(active[0].id, a.id);

                assert_eq!(count_chunks(conn, Some("s1"))?, 2);
                assert_eq!(count_chunks(conn, None)?, 3);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_nulls_children() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                let parent =
                    create_chunk(conn, &CreateChunkInput::leaf("s1", ChunkContent::default()))?;
                let child = create_chunk(
                    conn,
                    &CreateChunkInput {
                        session_id: "s1".to_string(),
                        content: content_with_text("child"),
                        parent_id: Some(parent.id.clone()),
                        depth: 0,
                        summary: None,
                    },
                )?;
                assert_eq!(get_children(conn, &parent.id)?.len(), 1);

                assert!(delete_chunk(conn, &parent.id)?);
                let orphan = get_chunk(conn, &child.id)?.unwrap();
                assert!(orphan.parent_id.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_recent_summaries() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                create_chunk(conn, &CreateChunkInput::leaf("s1", content_with_text("leaf")))?;
                let summary = create_chunk(
                    conn,
                    &CreateChunkInput {
                        session_id: "s1".to_string(),
                        content: ChunkContent::default(),
                        parent_id: None,
                        depth: 1,
                        summary: Some("compacted work".to_string()),
                    },
                )?;

                let recent = recent_summaries(conn, 5)?;
                assert_eq!(recent.len(), 1);
                assert_eq!(recent[0].id, summary.id);
                Ok(())
            })
            .unwrap();
    }
}
