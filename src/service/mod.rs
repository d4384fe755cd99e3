//! Service facades over storage, search, and the tracker

pub mod chunks;
pub mod memory;
pub mod runtime;

pub use chunks::{ChunkSearchOptions, ChunkService};
pub use memory::{MemorySearchOptions, MemoryService};
pub use runtime::Runtime;
