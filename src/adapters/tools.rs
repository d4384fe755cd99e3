//! Tool dispatch for the host's tool surface
//!
//! Each tool takes already-parsed arguments, calls into the services, and
//! returns a `ToolResponse` the host can render on any surface. Validation
//! problems come back as error responses; storage failures propagate.

use serde::Serialize;

use crate::error::Result;
use crate::service::chunks::ChunkSearchOptions;
use crate::service::memory::MemorySearchOptions;
use crate::service::runtime::Runtime;
use crate::storage::memory_repo::{ListMemoryOptions, UpdateMemoryInput};
use crate::types::MemoryType;

/// Tool definitions: (name, description, JSON schema for arguments)
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    (
        "memory_add",
        "Store a project memory: a preference, pattern, gotcha, fact, or learned insight.",
        r#"{
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The content to remember"},
                "type": {"type": "string", "enum": ["preference", "pattern", "gotcha", "fact", "learned"], "description": "Memory classification"},
                "tags": {"type": "array", "items": {"type": "string"}, "description": "Optional labels"}
            },
            "required": ["content", "type"]
        }"#,
    ),
    (
        "memory_search",
        "Search project memories by free text.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search text"},
                "type": {"type": "string", "enum": ["preference", "pattern", "gotcha", "fact", "learned"], "description": "Restrict to one classification"},
                "limit": {"type": "integer", "minimum": 1, "description": "Maximum results"}
            },
            "required": ["query"]
        }"#,
    ),
    (
        "memory_list",
        "List stored project memories, newest first.",
        r#"{
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["preference", "pattern", "gotcha", "fact", "learned"]},
                "limit": {"type": "integer", "minimum": 1},
                "offset": {"type": "integer", "minimum": 0}
            }
        }"#,
    ),
    (
        "memory_forget",
        "Delete a project memory by id.",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Memory id (mem_...)"}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "history_expand",
        "Load a session history chunk, optionally with the chunks it summarizes.",
        r#"{
            "type": "object",
            "properties": {
                "chunk_id": {"type": "string", "description": "Chunk id (ch_...)"},
                "include_children": {"type": "boolean", "default": false}
            },
            "required": ["chunk_id"]
        }"#,
    ),
    (
        "history_search",
        "Search session history chunks by free text.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search text"},
                "session": {"type": "string", "description": "Restrict to one session"}
            },
            "required": ["query"]
        }"#,
    ),
];

/// A surface-independent tool result
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub ok: bool,
    pub title: String,
    pub body: String,
}

impl ToolResponse {
    fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            ok: true,
            title: title.into(),
            body: body.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            title: "Error".to_string(),
            body: message.into(),
        }
    }
}

fn parse_type(type_str: &str) -> std::result::Result<MemoryType, ToolResponse> {
    type_str.parse().map_err(|_| {
        ToolResponse::error(format!(
            "Unknown memory type '{}'. Valid types: {}",
            type_str,
            MemoryType::ALL.join(", ")
        ))
    })
}

/// Store a new memory
pub fn memory_add(
    runtime: &Runtime,
    content: &str,
    type_str: &str,
    tags: Option<Vec<String>>,
) -> Result<ToolResponse> {
    if content.trim().is_empty() {
        return Ok(ToolResponse::error("Memory content cannot be empty"));
    }
    let memory_type = match parse_type(type_str) {
        Ok(t) => t,
        Err(response) => return Ok(response),
    };

    let memory = runtime.memories.add(content, memory_type, tags, None)?;
    Ok(ToolResponse::success(
        "Memory saved",
        format!("[{}] {} ({})", memory.memory_type, memory.content, memory.id),
    ))
}

/// Search memories and render a ranked list
pub fn memory_search(
    runtime: &Runtime,
    query: &str,
    type_str: Option<&str>,
    limit: Option<usize>,
) -> Result<ToolResponse> {
    let memory_type = match type_str.map(parse_type).transpose() {
        Ok(t) => t,
        Err(response) => return Ok(response),
    };

    let results = runtime.memories.search(
        query,
        &MemorySearchOptions { limit, memory_type },
    )?;
    if results.is_empty() {
        return Ok(ToolResponse::success("No matches", "No memories matched."));
    }

    let mut body = String::new();
    for (memory, _rank) in &results {
        body.push_str(&format!(
            "- [{}] {} ({})\n",
            memory.memory_type, memory.content, memory.id
        ));
    }
    Ok(ToolResponse::success(
        format!("{} memories", results.len()),
        body,
    ))
}

/// List memories, newest first
pub fn memory_list(
    runtime: &Runtime,
    type_str: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<ToolResponse> {
    let memory_type = match type_str.map(parse_type).transpose() {
        Ok(t) => t,
        Err(response) => return Ok(response),
    };

    let mut options = ListMemoryOptions {
        memory_type,
        ..Default::default()
    };
    if let Some(limit) = limit {
        options.limit = limit;
    }
    if let Some(offset) = offset {
        options.offset = offset;
    }

    let memories = runtime.memories.list(&options)?;
    let total = runtime.memories.count(memory_type)?;
    if memories.is_empty() {
        return Ok(ToolResponse::success("No memories", "Nothing stored yet."));
    }

    let mut body = String::new();
    for memory in &memories {
        body.push_str(&format!(
            "- [{}] {} ({})\n",
            memory.memory_type, memory.content, memory.id
        ));
    }
    Ok(ToolResponse::success(
        format!("{} of {} memories", memories.len(), total),
        body,
    ))
}

/// Delete a memory
pub fn memory_forget(runtime: &Runtime, memory_id: &str) -> Result<ToolResponse> {
    if runtime.memories.forget(memory_id)? {
        Ok(ToolResponse::success(
            "Memory forgotten",
            format!("Deleted {}", memory_id),
        ))
    } else {
        Ok(ToolResponse::error(format!(
            "No memory with id {}",
            memory_id
        )))
    }
}

/// Load a chunk, optionally with its subtree
pub fn history_expand(
    runtime: &Runtime,
    chunk_id: &str,
    include_children: bool,
) -> Result<ToolResponse> {
    let Some(chunks) = runtime.chunks.expand(chunk_id, include_children)? else {
        return Ok(ToolResponse::error(format!("No chunk with id {}", chunk_id)));
    };

    let mut body = String::new();
    for chunk in &chunks {
        let label = chunk
            .summary
            .as_deref()
            .unwrap_or("(messages)");
        body.push_str(&format!(
            "- {} depth={} status={} messages={}: {}\n",
            chunk.id,
            chunk.depth,
            chunk.status,
            chunk.content.messages.len(),
            label
        ));
    }
    Ok(ToolResponse::success(
        format!("{} chunk(s)", chunks.len()),
        body,
    ))
}

/// Search session history
pub fn history_search(
    runtime: &Runtime,
    query: &str,
    session_id: Option<&str>,
) -> Result<ToolResponse> {
    let results = runtime.chunks.search(
        query,
        &ChunkSearchOptions {
            session_id: session_id.map(|s| s.to_string()),
            ..Default::default()
        },
    )?;
    if results.is_empty() {
        return Ok(ToolResponse::success("No matches", "No history matched."));
    }

    let mut body = String::new();
    for (chunk, _rank) in &results {
        let label = chunk.summary.as_deref().unwrap_or("(messages)");
        body.push_str(&format!(
            "- {} session={} depth={}: {}\n",
            chunk.id, chunk.session_id, chunk.depth, label
        ));
    }
    Ok(ToolResponse::success(
        format!("{} chunk(s)", results.len()),
        body,
    ))
}

/// Update fields of an existing memory
pub fn memory_update(
    runtime: &Runtime,
    memory_id: &str,
    content: Option<String>,
    type_str: Option<&str>,
    tags: Option<Vec<String>>,
) -> Result<ToolResponse> {
    let memory_type = match type_str.map(parse_type).transpose() {
        Ok(t) => t,
        Err(response) => return Ok(response),
    };

    let input = UpdateMemoryInput {
        content,
        memory_type,
        tags,
    };
    match runtime.memories.update(memory_id, &input)? {
        Some(memory) => Ok(ToolResponse::success(
            "Memory updated",
            format!("[{}] {} ({})", memory.memory_type, memory.content, memory.id),
        )),
        None => Ok(ToolResponse::error(format!(
            "No memory with id {}",
            memory_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::storage::{MigrateSet, Storage};
    use crate::types::ChunkContent;

    fn runtime() -> Runtime {
        let storage = Storage::open_in_memory(MigrateSet::All).unwrap();
        Runtime::with_storage(storage, Settings::default())
    }

    #[test]
    fn test_memory_add_validates_type() {
        let rt = runtime();
        let bad = memory_add(&rt, "x", "note", None).unwrap();
        assert!(!bad.ok);
        assert!(bad.body.contains("preference"));

        let empty = memory_add(&rt, "   ", "fact", None).unwrap();
        assert!(!empty.ok);

        let good = memory_add(&rt, "Keep functions small", "preference", None).unwrap();
        assert!(good.ok);
        assert!(good.body.contains("mem_"));
    }

    #[test]
    fn test_memory_search_and_forget() {
        let rt = runtime();
        memory_add(&rt, "The staging DB resets nightly", "gotcha", None).unwrap();

        let found = memory_search(&rt, "staging", None, None).unwrap();
        assert!(found.ok);
        assert!(found.body.contains("staging DB"));

        let id = found
            .body
            .split('(')
            .nth(1)
            .unwrap()
            .trim_end_matches(")\n")
            .to_string();
        assert!(memory_forget(&rt, &id).unwrap().ok);
        assert!(!memory_forget(&rt, &id).unwrap().ok);
    }

    #[test]
    fn test_history_expand_missing() {
        let rt = runtime();
        let response = history_expand(&rt, "ch_missing00001", false).unwrap();
        assert!(!response.ok);
    }

    #[test]
    fn test_history_search_scoped_to_session() {
        let rt = runtime();
        rt.chunks.create("s1", ChunkContent::default()).unwrap();
        rt.chunks.compact("s1", "wired up the adapters").unwrap();
        rt.chunks.create("s2", ChunkContent::default()).unwrap();
        rt.chunks.compact("s2", "wired up the tests").unwrap();

        let scoped = history_search(&rt, "wired", Some("s1")).unwrap();
        assert!(scoped.ok);
        assert!(scoped.body.contains("session=s1"));
        assert!(!scoped.body.contains("session=s2"));
    }
}
