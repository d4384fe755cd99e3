//! Database queries for memory rows

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::id;
use crate::types::{Memory, MemorySource, MemoryType};

/// Input for creating a memory
#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Option<Vec<String>>,
    pub source: Option<MemorySource>,
}

/// Fields to change on an existing memory; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateMemoryInput {
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
}

impl UpdateMemoryInput {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.memory_type.is_none() && self.tags.is_none()
    }
}

/// Options for listing memories
#[derive(Debug, Clone)]
pub struct ListMemoryOptions {
    pub limit: i64,
    pub offset: i64,
    pub memory_type: Option<MemoryType>,
}

impl Default for ListMemoryOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            memory_type: None,
        }
    }
}

const MEMORY_COLUMNS: &str = "id, content, type, tags, source, created_at, updated_at, embedding";

fn decode<T>(idx: usize, result: std::result::Result<T, String>) -> rusqlite::Result<T> {
    result.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Parse a memory from a database row
pub fn memory_from_row(row: &Row) -> rusqlite::Result<Memory> {
    let type_str: String = row.get(2)?;
    let tags_json: Option<String> = row.get(3)?;
    let source_str: Option<String> = row.get(4)?;

    let memory_type = decode(2, type_str.parse::<MemoryType>())?;
    let tags = match tags_json {
        Some(json) => Some(decode(3, serde_json::from_str(&json).map_err(|e| e.to_string()))?),
        None => None,
    };
    let source = match source_str {
        Some(s) => decode(4, s.parse::<MemorySource>())?,
        None => MemorySource::User,
    };

    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        memory_type,
        tags,
        source,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        embedding: row.get(7)?,
    })
}

/// Create a new memory
pub fn create_memory(conn: &Connection, input: &CreateMemoryInput) -> Result<Memory> {
    let memory_id = id::memory_id();
    let now = chrono::Utc::now().timestamp();
    let tags_json = input
        .tags
        .as_ref()
        .map(|tags| serde_json::to_string(tags))
        .transpose()?;
    let source = input.source.unwrap_or_default();

    conn.execute(
        "INSERT INTO memories (id, content, type, tags, source, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
        params![
            memory_id,
            input.content,
            input.memory_type.as_str(),
            tags_json,
            source.as_str(),
            now,
        ],
    )?;

    tracing::debug!(id = %memory_id, "created memory");
    get_memory(conn, &memory_id)?
        .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
}

/// Fetch a memory by id
pub fn get_memory(conn: &Connection, memory_id: &str) -> Result<Option<Memory>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM memories WHERE id = ?1",
        MEMORY_COLUMNS
    ))?;
    let memory = stmt
        .query_row(params![memory_id], memory_from_row)
        .optional()?;
    Ok(memory)
}

/// Update the provided fields of a memory
///
/// Returns `None` when the row is missing. With no fields set, returns the
/// existing row untouched. Any real change also stamps `updated_at`.
pub fn update_memory(
    conn: &Connection,
    memory_id: &str,
    input: &UpdateMemoryInput,
) -> Result<Option<Memory>> {
    let Some(existing) = get_memory(conn, memory_id)? else {
        return Ok(None);
    };
    if input.is_empty() {
        return Ok(Some(existing));
    }

    let mut fragments: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(content) = &input.content {
        fragments.push("content = ?");
        values.push(Box::new(content.clone()));
    }
    if let Some(memory_type) = input.memory_type {
        fragments.push("type = ?");
        values.push(Box::new(memory_type.as_str()));
    }
    if let Some(tags) = &input.tags {
        fragments.push("tags = ?");
        values.push(Box::new(serde_json::to_string(tags)?));
    }

    fragments.push("updated_at = ?");
    values.push(Box::new(chrono::Utc::now().timestamp()));

    let sql = format!("UPDATE memories SET {} WHERE id = ?", fragments.join(", "));
    values.push(Box::new(memory_id.to_string()));

    let value_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, value_refs.as_slice())?;

    get_memory(conn, memory_id)
}

/// Delete a memory; false when the row was absent
pub fn delete_memory(conn: &Connection, memory_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?;
    Ok(deleted > 0)
}

/// List memories, newest first
///
/// `rowid` disambiguates same-second inserts so pagination stays stable.
pub fn list_memories(conn: &Connection, options: &ListMemoryOptions) -> Result<Vec<Memory>> {
    let memories = match options.memory_type {
        Some(memory_type) => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM memories WHERE type = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                MEMORY_COLUMNS
            ))?;
            let rows = stmt.query_map(
                params![memory_type.as_str(), options.limit, options.offset],
                memory_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM memories
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                MEMORY_COLUMNS
            ))?;
            let rows = stmt.query_map(params![options.limit, options.offset], memory_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(memories)
}

/// Count memories, optionally of one type
pub fn count_memories(conn: &Connection, memory_type: Option<MemoryType>) -> Result<i64> {
    let count = match memory_type {
        Some(memory_type) => conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE type = ?1",
            params![memory_type.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?,
    };
    Ok(count)
}
