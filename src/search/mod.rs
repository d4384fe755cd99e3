//! Full-text search over memories and chunks
//!
//! User text goes through the compiler before it ever reaches a `MATCH`
//! expression; the ranked queries join the FTS index back to the base
//! tables and surface the raw BM25 rank.

pub mod compiler;
pub mod queries;

pub use compiler::compile_match_query;
pub use queries::{memories_by_type, recent_memories, search_chunks, search_memories};
