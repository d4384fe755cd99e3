//! Storage engine for Memoir
//!
//! One SQLite file holds both corpora. The `memory` and `history`
//! subsystems migrate independently (each with its own tracking table), and
//! every write funnels through the `Storage` handle's mutex so WAL readers
//! never race a writer on this connection.

pub mod chunk_repo;
pub mod connection;
pub mod memory_repo;
pub mod migrations;
pub mod tree;

pub use chunk_repo::{CreateChunkInput, UpdateChunkInput};
pub use connection::{MigrateSet, Storage};
pub use memory_repo::{CreateMemoryInput, ListMemoryOptions, UpdateMemoryInput};
pub use migrations::{ChecksumMismatch, Migration, Subsystem};
pub use tree::{CompactResult, TreeRow};
