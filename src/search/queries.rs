//! Ranked full-text queries over both corpora
//!
//! FTS5's `bm25()` ranks lower-is-better; that convention is preserved all
//! the way to the API so callers can merge result lists without flipping
//! signs.

use rusqlite::{params, Connection};

use super::compiler::compile_match_query;
use crate::error::Result;
use crate::storage::chunk_repo::chunk_from_row;
use crate::storage::memory_repo::memory_from_row;
use crate::types::{Chunk, Memory, MemoryType};

/// Search memories, best match first
pub fn search_memories(
    conn: &Connection,
    query: &str,
    limit: i64,
    memory_type: Option<MemoryType>,
) -> Result<Vec<(Memory, f64)>> {
    let Some(match_expr) = compile_match_query(query) else {
        return Ok(Vec::new());
    };

    let mut sql = String::from(
        "SELECT m.id, m.content, m.type, m.tags, m.source, m.created_at, m.updated_at,
                m.embedding, bm25(memories_fts) AS rank
         FROM memories_fts fts
         JOIN memories m ON m.rowid = fts.rowid
         WHERE memories_fts MATCH ?",
    );
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];

    if let Some(memory_type) = memory_type {
        sql.push_str(" AND m.type = ?");
        values.push(Box::new(memory_type.as_str()));
    }

    sql.push_str(" ORDER BY rank ASC LIMIT ?");
    values.push(Box::new(limit));

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| {
        let memory = memory_from_row(row)?;
        let rank: f64 = row.get(8)?;
        Ok((memory, rank))
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Search chunks, best match first
///
/// `min_depth` is inclusive; pass 1 to restrict results to summaries.
pub fn search_chunks(
    conn: &Connection,
    query: &str,
    limit: i64,
    session_id: Option<&str>,
    min_depth: Option<i64>,
) -> Result<Vec<(Chunk, f64)>> {
    let Some(match_expr) = compile_match_query(query) else {
        return Ok(Vec::new());
    };

    let mut sql = String::from(
        "SELECT c.id, c.session_id, c.parent_id, c.depth, c.child_refs, c.content, c.summary,
                c.status, c.created_at, c.finalized_at, c.compacted_at, c.embedding,
                bm25(chunks_fts) AS rank
         FROM chunks_fts fts
         JOIN chunks c ON c.rowid = fts.rowid
         WHERE chunks_fts MATCH ?",
    );
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];

    if let Some(session_id) = session_id {
        sql.push_str(" AND c.session_id = ?");
        values.push(Box::new(session_id.to_string()));
    }
    if let Some(min_depth) = min_depth {
        sql.push_str(" AND c.depth >= ?");
        values.push(Box::new(min_depth));
    }

    sql.push_str(" ORDER BY rank ASC LIMIT ?");
    values.push(Box::new(limit));

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| {
        let chunk = chunk_from_row(row)?;
        let rank: f64 = row.get(12)?;
        Ok((chunk, rank))
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Memories of one type, newest first
pub fn memories_by_type(
    conn: &Connection,
    memory_type: MemoryType,
    limit: i64,
) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, content, type, tags, source, created_at, updated_at, embedding
         FROM memories WHERE type = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![memory_type.as_str(), limit], memory_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Most recently created memories
pub fn recent_memories(conn: &Connection, limit: i64) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, content, type, tags, source, created_at, updated_at, embedding
         FROM memories
         ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], memory_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
