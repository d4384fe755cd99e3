//! Chunk tree traversal and compaction
//!
//! Chunks form a tree through `parent_id`. Traversal stays in SQL as
//! recursive CTEs; compaction binds N active chunks under a freshly minted
//! summary chunk inside a single transaction.

use rusqlite::{params, Connection};

use super::chunk_repo::{chunk_from_row, get_chunk, CHUNK_COLUMNS};
use crate::error::{MemoirError, Result};
use crate::id;
use crate::storage::Storage;
use crate::types::{Chunk, ChunkContent, ChunkStatus};

/// A chunk tagged with its distance from the traversal start
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub chunk: Chunk,
    /// 0 at the start chunk, increasing with distance
    pub level: i64,
}

/// Result of a compaction
#[derive(Debug, Clone)]
pub struct CompactResult {
    pub summary: Chunk,
    /// The absorbed chunks, reloaded after the status flip
    pub children: Vec<Chunk>,
}

/// Walk from a chunk up through `parent_id` links
///
/// Rows come back root-first; the start chunk is last with level 0. A
/// missing start id yields an empty sequence.
pub fn ancestors(conn: &Connection, chunk_id: &str) -> Result<Vec<TreeRow>> {
    let sql = format!(
        "WITH RECURSIVE ancestry(id, level) AS (
             SELECT id, 0 FROM chunks WHERE id = ?1
             UNION ALL
             SELECT c.parent_id, a.level + 1
             FROM ancestry a
             JOIN chunks c ON c.id = a.id
             WHERE c.parent_id IS NOT NULL
         )
         SELECT {}, a.level
         FROM ancestry a
         JOIN chunks ch ON ch.id = a.id
         ORDER BY a.level DESC",
        qualified_columns()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![chunk_id], |row| {
        Ok(TreeRow {
            chunk: chunk_from_row(row)?,
            level: row.get(12)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Walk from a chunk down through its children
///
/// Rows come back level-ascending; the start chunk is first with level 0.
/// A missing start id yields an empty sequence.
pub fn descendants(conn: &Connection, chunk_id: &str) -> Result<Vec<TreeRow>> {
    let sql = format!(
        "WITH RECURSIVE subtree(id, level) AS (
             SELECT id, 0 FROM chunks WHERE id = ?1
             UNION ALL
             SELECT c.id, s.level + 1
             FROM subtree s
             JOIN chunks c ON c.parent_id = s.id
         )
         SELECT {}, s.level
         FROM subtree s
         JOIN chunks ch ON ch.id = s.id
         ORDER BY s.level ASC, ch.created_at ASC, ch.rowid ASC",
        qualified_columns()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![chunk_id], |row| {
        Ok(TreeRow {
            chunk: chunk_from_row(row)?,
            level: row.get(12)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The root-to-target path without level tags
pub fn full_context(conn: &Connection, chunk_id: &str) -> Result<Vec<Chunk>> {
    Ok(ancestors(conn, chunk_id)?
        .into_iter()
        .map(|row| row.chunk)
        .collect())
}

fn qualified_columns() -> String {
    CHUNK_COLUMNS
        .split(", ")
        .map(|col| format!("ch.{}", col.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Atomically compact chunks under a new summary chunk
///
/// Verifies every requested id first; any unresolved id fails the whole
/// operation with nothing written. The new summary's depth is one above the
/// deepest child, and `child_refs` preserves the argument order.
pub fn compact(
    storage: &Storage,
    session_id: &str,
    chunk_ids: &[String],
    summary: &str,
) -> Result<CompactResult> {
    if chunk_ids.is_empty() {
        return Err(MemoirError::EmptyCompaction);
    }

    storage.with_transaction(|conn| {
        let mut children = Vec::with_capacity(chunk_ids.len());
        let mut missing = Vec::new();
        for chunk_id in chunk_ids {
            match get_chunk(conn, chunk_id)? {
                Some(chunk) => children.push(chunk),
                None => missing.push(chunk_id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(MemoirError::MissingChunks(missing));
        }

        let summary_depth = children.iter().map(|c| c.depth).max().unwrap_or(0) + 1;
        let summary_id = id::chunk_id();
        let now = chrono::Utc::now().timestamp();
        let child_refs_json = serde_json::to_string(chunk_ids)?;
        let content_json = serde_json::to_string(&ChunkContent::default())?;

        conn.execute(
            "INSERT INTO chunks (id, session_id, parent_id, depth, child_refs, content,
                                 summary, status, created_at, finalized_at, compacted_at)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL)",
            params![
                summary_id,
                session_id,
                summary_depth,
                child_refs_json,
                content_json,
                summary,
                ChunkStatus::Active.as_str(),
                now,
            ],
        )?;

        for chunk_id in chunk_ids {
            conn.execute(
                "UPDATE chunks SET parent_id = ?1, status = ?2, compacted_at = ?3 WHERE id = ?4",
                params![summary_id, ChunkStatus::Compacted.as_str(), now, chunk_id],
            )?;
        }

        let summary_chunk = get_chunk(conn, &summary_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        let mut reloaded = Vec::with_capacity(chunk_ids.len());
        for chunk_id in chunk_ids {
            reloaded
                .push(get_chunk(conn, chunk_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?);
        }

        tracing::debug!(
            session = session_id,
            summary = %summary_id,
            absorbed = chunk_ids.len(),
            "compacted chunks"
        );

        Ok(CompactResult {
            summary: summary_chunk,
            children: reloaded,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunk_repo::{create_chunk, CreateChunkInput};
    use crate::storage::{MigrateSet, Storage};

    fn storage() -> Storage {
        Storage::open_in_memory(MigrateSet::History).unwrap()
    }

    fn leaf(storage: &Storage, session: &str) -> Chunk {
        storage
            .with_connection(|conn| {
                create_chunk(conn, &CreateChunkInput::leaf(session, ChunkContent::default()))
            })
            .unwrap()
    }

    #[test]
    fn test_compact_builds_tree() {
        let storage = storage();
        let a = leaf(&storage, "s1");
        let b = leaf(&storage, "s1");

        let ids = vec![a.id.clone(), b.id.clone()];
        let result = compact(&storage, "s1", &ids, "pair summary").unwrap();

        assert_eq!(result.summary.depth, 1);
        assert_eq!(result.summary.status, ChunkStatus::Active);
        assert_eq!(result.summary.summary.as_deref(), Some("pair summary"));
        assert_eq!(result.summary.child_refs.as_ref().unwrap(), &ids);

        assert_eq!(result.children.len(), 2);
        for child in &result.children {
            assert_eq!(child.status, ChunkStatus::Compacted);
            assert_eq!(child.parent_id.as_deref(), Some(result.summary.id.as_str()));
            assert!(child.compacted_at.is_some());
        }
    }

    #[test]
    fn test_compact_depth_tracks_deepest_child() {
        let storage = storage();
        let a = leaf(&storage, "s1");
        let b = leaf(&storage, "s1");
        let first = compact(&storage, "s1", &[a.id.clone(), b.id], "inner").unwrap();

        let c = leaf(&storage, "s1");
        let second = compact(
            &storage,
            "s1",
            &[first.summary.id.clone(), c.id],
            "outer",
        )
        .unwrap();
        assert_eq!(second.summary.depth, 2);
    }

    #[test]
    fn test_compact_empty_list() {
        let storage = storage();
        let err = compact(&storage, "s1", &[], "nothing").unwrap_err();
        assert!(matches!(err, MemoirError::EmptyCompaction));
    }

    #[test]
    fn test_compact_missing_id_mutates_nothing() {
        let storage = storage();
        let a = leaf(&storage, "s1");

        let err = compact(
            &storage,
            "s1",
            &[a.id.clone(), "ch_missing00001".to_string()],
            "broken",
        )
        .unwrap_err();
        match err {
            MemoirError::MissingChunks(ids) => {
                assert_eq!(ids, vec!["ch_missing00001".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }

        storage
            .with_connection(|conn| {
                let untouched = get_chunk(conn, &a.id)?.unwrap();
                assert_eq!(untouched.status, ChunkStatus::Active);
                assert!(untouched.parent_id.is_none());
                assert_eq!(crate::storage::chunk_repo::count_chunks(conn, None)?, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_ancestors_root_first() {
        let storage = storage();
        let a = leaf(&storage, "s1");
        let first = compact(&storage, "s1", &[a.id.clone()], "inner").unwrap();
        let outer = compact(&storage, "s1", &[first.summary.id.clone()], "outer").unwrap();

        storage
            .with_connection(|conn| {
                let path = ancestors(conn, &a.id)?;
                let ids: Vec<&str> = path.iter().map(|r| r.chunk.id.as_str()).collect();
                assert_eq!(
                    ids,
                    vec![
                        outer.summary.id.as_str(),
                        first.summary.id.as_str(),
                        a.id.as_str()
                    ]
                );
                let levels: Vec<i64> = path.iter().map(|r| r.level).collect();
                assert_eq!(levels, vec![2, 1, 0]);

                let context = full_context(conn, &a.id)?;
                assert_eq!(context.len(), 3);
                assert_eq!(context[0].id, outer.summary.id);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_descendants_level_ascending() {
        let storage = storage();
        let a = leaf(&storage, "s1");
        let b = leaf(&storage, "s1");
        let result = compact(&storage, "s1", &[a.id.clone(), b.id.clone()], "sum").unwrap();

        storage
            .with_connection(|conn| {
                let tree = descendants(conn, &result.summary.id)?;
                assert_eq!(tree.len(), 3);
                assert_eq!(tree[0].chunk.id, result.summary.id);
                assert_eq!(tree[0].level, 0);
                let leaf_ids: Vec<&str> =
                    tree[1..].iter().map(|r| r.chunk.id.as_str()).collect();
                assert_eq!(leaf_ids, vec![a.id.as_str(), b.id.as_str()]);
                assert!(tree[1..].iter().all(|r| r.level == 1));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_traversal_missing_start_is_empty() {
        let storage = storage();
        storage
            .with_connection(|conn| {
                assert!(ancestors(conn, "ch_missing00001")?.is_empty());
                assert!(descendants(conn, "ch_missing00001")?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}
