//! Process-wide runtime context
//!
//! The host initializes one `Runtime` at plugin start and tears it down at
//! shutdown. Call sites that cannot thread the value explicitly use the
//! `init`/`get`/`reset` globals; `get` before `init` is a hard error rather
//! than a silent empty store.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::chunks::ChunkService;
use super::memory::MemoryService;
use crate::config::Settings;
use crate::error::{MemoirError, Result};
use crate::storage::{MigrateSet, Storage};
use crate::tracker::MessageTracker;

/// Everything a host adapter needs, built once per process
pub struct Runtime {
    pub storage: Storage,
    pub memories: MemoryService,
    pub chunks: ChunkService,
    pub tracker: Arc<MessageTracker>,
    pub settings: Settings,
}

impl Runtime {
    /// Build a runtime over the database at `db_path`
    pub fn open(db_path: &str, settings: Settings) -> Result<Self> {
        let storage = Storage::open(db_path, MigrateSet::All)?;
        Ok(Self::with_storage(storage, settings))
    }

    /// Build a runtime over an already opened store
    pub fn with_storage(storage: Storage, settings: Settings) -> Self {
        let tracker = Arc::new(MessageTracker::new());
        let memories = MemoryService::new(storage.clone(), settings.clone());
        let chunks = ChunkService::new(storage.clone(), tracker.clone(), settings.clone());
        Self {
            storage,
            memories,
            chunks,
            tracker,
            settings,
        }
    }
}

static RUNTIME: Lazy<RwLock<Option<Arc<Runtime>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide runtime
///
/// Fails when one is already installed; `reset` first to replace it.
pub fn init(runtime: Runtime) -> Result<Arc<Runtime>> {
    let mut slot = RUNTIME.write();
    if slot.is_some() {
        return Err(MemoirError::Runtime(
            "runtime already initialized".to_string(),
        ));
    }
    let runtime = Arc::new(runtime);
    *slot = Some(runtime.clone());
    Ok(runtime)
}

/// The installed runtime
pub fn get() -> Result<Arc<Runtime>> {
    RUNTIME
        .read()
        .clone()
        .ok_or_else(|| MemoirError::Runtime("runtime not initialized".to_string()))
}

/// Drop the installed runtime, if any
pub fn reset() {
    *RUNTIME.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Runtime {
        let storage = Storage::open_in_memory(MigrateSet::All).unwrap();
        Runtime::with_storage(storage, Settings::default())
    }

    // The global slot is shared across the test binary; exercise the whole
    // lifecycle in one test to avoid order dependence.
    #[test]
    fn test_lifecycle() {
        reset();
        assert!(matches!(get(), Err(MemoirError::Runtime(_))));

        init(runtime()).unwrap();
        assert!(get().is_ok());
        assert!(matches!(init(runtime()), Err(MemoirError::Runtime(_))));

        reset();
        assert!(get().is_err());
    }

    #[test]
    fn test_services_share_one_tracker() {
        let rt = runtime();
        rt.tracker.set_current_chunk_id("s1", "ch_000000000000");
        assert_eq!(
            rt.chunks.tracker().get_current_chunk_id("s1").as_deref(),
            Some("ch_000000000000")
        );
    }
}
