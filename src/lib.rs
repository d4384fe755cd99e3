//! Memoir - repository-scoped memory for coding assistants
//!
//! Two corpora in one SQLite file: curated project memories, and a tree of
//! session history chunks that compacts hierarchically so a summary can be
//! expanded back down to the original messages. Both are searchable through
//! FTS5 with BM25 ranking.

pub mod adapters;
pub mod config;
pub mod detect;
pub mod error;
pub mod id;
pub mod search;
pub mod service;
pub mod storage;
pub mod tracker;
pub mod types;

pub use config::Settings;
pub use error::{MemoirError, Result};
pub use service::{ChunkService, MemoryService, Runtime};
pub use storage::{MigrateSet, Storage};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
