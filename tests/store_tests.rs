//! End-to-end tests over the public service API
//!
//! Each test opens a fresh in-memory store and drives a whole flow the way
//! the host adapters would.

use std::sync::Arc;

use memoir::config::Settings;
use memoir::service::{ChunkSearchOptions, ChunkService, MemorySearchOptions, MemoryService};
use memoir::storage::chunk_repo::{create_chunk, get_chunk, CreateChunkInput};
use memoir::storage::memory_repo::UpdateMemoryInput;
use memoir::storage::tree;
use memoir::storage::{MigrateSet, Storage, Subsystem};
use memoir::tracker::{MessageTracker, TrackedMessage};
use memoir::types::{
    ChunkContent, ChunkStatus, MemorySource, MemoryType, MessagePart, MessageRole,
};
use memoir::MemoirError;

fn open_services() -> (Storage, MemoryService, ChunkService) {
    let storage = Storage::open_in_memory(MigrateSet::All).unwrap();
    let settings = Settings::default();
    let tracker = Arc::new(MessageTracker::new());
    let memories = MemoryService::new(storage.clone(), settings.clone());
    let chunks = ChunkService::new(storage.clone(), tracker, settings);
    (storage, memories, chunks)
}

#[test]
fn memory_round_trip() {
    let (_storage, memories, _chunks) = open_services();

    let created = memories
        .add("Always use strict mode", MemoryType::Preference, None, None)
        .unwrap();
    assert!(created.id.starts_with("mem_"));
    assert_eq!(created.id.len(), 16);
    assert_eq!(created.source, MemorySource::User);
    assert!(created.updated_at.is_none());

    let updated = memories
        .update(
            &created.id,
            &UpdateMemoryInput {
                content: Some("Use strict mode".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert!(updated.updated_at.is_some());
    assert_eq!(
        memories.get(&created.id).unwrap().unwrap().content,
        "Use strict mode"
    );

    assert!(memories.forget(&created.id).unwrap());
    assert!(!memories.forget(&created.id).unwrap());
    assert!(memories.get(&created.id).unwrap().is_none());
}

#[test]
fn search_ranks_denser_match_first() {
    let (_storage, memories, _chunks) = open_services();

    let dense = memories
        .add(
            "TypeScript TypeScript TypeScript matters",
            MemoryType::Fact,
            None,
            None,
        )
        .unwrap();
    memories
        .add("TypeScript matters", MemoryType::Fact, None, None)
        .unwrap();

    let results = memories
        .search("TypeScript", &MemorySearchOptions::default())
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0.id, dense.id);
    // Lower rank is better, and ranks come back non-decreasing
    assert!(results[0].1 <= results[1].1);
}

#[test]
fn search_survives_hostile_input() {
    let (_storage, memories, _chunks) = open_services();
    memories
        .add(
            "Use Result<T, E> for error handling",
            MemoryType::Pattern,
            None,
            None,
        )
        .unwrap();

    for query in ["Result<T, E>", "\"quoted\"", "test*", "(parentheses)"] {
        memories
            .search(query, &MemorySearchOptions::default())
            .unwrap();
    }

    assert!(memories
        .search("", &MemorySearchOptions::default())
        .unwrap()
        .is_empty());
    assert!(memories
        .search("   ", &MemorySearchOptions::default())
        .unwrap()
        .is_empty());
}

#[test]
fn keyword_guard_honors_code_boundaries() {
    let (_storage, memories, _chunks) = open_services();

    assert!(memories.detect_keyword("Please remember this"));
    assert!(!memories.detect_keyword("Use the `remember` function"));
    assert!(!memories.detect_keyword("```ts\nremember\n```"));
    assert!(!memories.detect_keyword("I remembered it"));
}

#[test]
fn compaction_is_atomic() {
    let (storage, _memories, _chunks) = open_services();

    let make = |depth: i64| {
        storage
            .with_connection(|conn| {
                create_chunk(
                    conn,
                    &CreateChunkInput {
                        session_id: "S".to_string(),
                        content: ChunkContent::default(),
                        parent_id: None,
                        depth,
                        summary: None,
                    },
                )
            })
            .unwrap()
    };
    let a = make(0);
    let b = make(1);
    let c = make(2);
    let ids = vec![a.id.clone(), b.id.clone(), c.id.clone()];

    let result = tree::compact(&storage, "S", &ids, "summary").unwrap();
    assert_eq!(result.summary.depth, 3);
    assert_eq!(result.summary.child_refs.as_ref().unwrap(), &ids);
    assert_eq!(result.summary.status, ChunkStatus::Active);
    for child in &result.children {
        assert_eq!(child.status, ChunkStatus::Compacted);
        assert_eq!(child.parent_id.as_deref(), Some(result.summary.id.as_str()));
        assert!(child.compacted_at.is_some());
    }

    // A missing id fails the whole call and mutates nothing
    let fresh = make(0);
    let bad_ids = vec![fresh.id.clone(), "ch_missing00001".to_string()];
    let err = tree::compact(&storage, "S", &bad_ids, "broken").unwrap_err();
    assert!(matches!(err, MemoirError::MissingChunks(_)));

    storage
        .with_connection(|conn| {
            let untouched = get_chunk(conn, &fresh.id)?.unwrap();
            assert_eq!(untouched.status, ChunkStatus::Active);
            assert!(untouched.parent_id.is_none());
            assert!(untouched.compacted_at.is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn finalization_pipeline() {
    let (_storage, _memories, chunks) = open_services();
    let tracker = chunks.tracker();

    tracker.track_message("S", TrackedMessage::new("m1", MessageRole::User));
    tracker.add_part(
        "S",
        "m1",
        "p1",
        MessagePart::Text {
            text: "Hello".to_string(),
        },
    );
    tracker.ensure_message("S", "m2", MessageRole::Assistant);
    tracker.add_part(
        "S",
        "m2",
        "p1",
        MessagePart::Tool {
            tool: "bash".to_string(),
            input: serde_json::json!({"command": "npm test"}),
            output: None,
        },
    );
    tracker.add_part(
        "S",
        "m2",
        "p2",
        MessagePart::File {
            text: "src/x.ts".to_string(),
        },
    );

    let chunk = chunks.finalize("S").unwrap().unwrap();
    let ids: Vec<&str> = chunk.content.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(
        chunk.content.metadata.tools_used.as_deref(),
        Some(&["bash".to_string()][..])
    );
    assert_eq!(
        chunk.content.metadata.files_modified.as_deref(),
        Some(&["src/x.ts".to_string()][..])
    );
    assert!(chunk.finalized_at.is_some());

    assert!(!tracker.has_messages("S"));
    assert_eq!(
        tracker.get_current_chunk_id("S").as_deref(),
        Some(chunk.id.as_str())
    );

    // A second finalize has nothing buffered
    assert!(chunks.finalize("S").unwrap().is_none());
}

#[test]
fn compact_then_expand_round_trip() {
    let (_storage, _memories, chunks) = open_services();
    let tracker = chunks.tracker();

    for (i, text) in ["set up the schema", "wrote the queries"].iter().enumerate() {
        let message_id = format!("m{}", i);
        tracker.ensure_message("S", &message_id, MessageRole::User);
        tracker.add_part(
            "S",
            &message_id,
            "p1",
            MessagePart::Text {
                text: text.to_string(),
            },
        );
        chunks.finalize("S").unwrap().unwrap();
    }

    let result = chunks.compact("S", "built the storage layer").unwrap().unwrap();
    assert_eq!(result.children.len(), 2);

    let subtree = chunks.expand(&result.summary.id, true).unwrap().unwrap();
    assert_eq!(subtree.len(), 3);
    assert_eq!(subtree[0].id, result.summary.id);

    // The original message text is reachable from the summary
    let texts: Vec<String> = subtree[1..]
        .iter()
        .flat_map(|c| c.content.messages.iter())
        .flat_map(|m| m.parts.iter())
        .filter_map(|p| match p {
            MessagePart::Text { text } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert!(texts.contains(&"set up the schema".to_string()));

    // And searchable by depth
    let summaries = chunks
        .search(
            "storage layer",
            &ChunkSearchOptions {
                min_depth: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].0.id, result.summary.id);
}

#[test]
fn migrations_validate_and_stay_idempotent() {
    let storage = Storage::open_in_memory(MigrateSet::All).unwrap();

    assert_eq!(storage.migrate(Subsystem::Memory).unwrap(), 0);
    assert_eq!(storage.migrate(Subsystem::History).unwrap(), 0);
    assert!(storage
        .validate_migrations(Subsystem::Memory)
        .unwrap()
        .is_empty());

    storage
        .with_connection(|conn| {
            conn.execute(
                "UPDATE x_history_migrations SET checksum = 'tampered' WHERE version = 1",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let mismatches = storage.validate_migrations(Subsystem::History).unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].version, 1);
    assert!(storage
        .validate_migrations(Subsystem::Memory)
        .unwrap()
        .is_empty());
}
