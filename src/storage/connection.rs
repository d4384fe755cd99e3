//! Database connection management
//!
//! One `Storage` handle wraps one SQLite connection behind a mutex: all
//! writes serialize through it, reads ride along under WAL. Opening a store
//! configures pragmas, probes for an optional vector extension, and brings
//! the requested subsystems up to the latest embedded schema.

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;

use super::migrations::{self, ChecksumMismatch, Subsystem};
use crate::error::Result;

/// Which subsystem schemas to migrate at open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrateSet {
    #[default]
    All,
    Memory,
    History,
    None,
}

impl MigrateSet {
    fn subsystems(&self) -> &'static [Subsystem] {
        match self {
            MigrateSet::All => &[Subsystem::Memory, Subsystem::History],
            MigrateSet::Memory => &[Subsystem::Memory],
            MigrateSet::History => &[Subsystem::History],
            MigrateSet::None => &[],
        }
    }
}

/// Storage engine wrapping SQLite
pub struct Storage {
    path: String,
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open or create a database at the given path
    pub fn open(path: &str, migrate: MigrateSet) -> Result<Self> {
        let mut conn = Self::create_connection(path)?;

        for subsystem in migrate.subsystems() {
            migrations::apply_pending(&mut conn, *subsystem)?;
        }

        Ok(Self {
            path: path.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (testing)
    pub fn open_in_memory(migrate: MigrateSet) -> Result<Self> {
        Self::open(":memory:", migrate)
    }

    fn create_connection(path: &str) -> Result<Connection> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Connection::open_with_flags(path, flags)?
        };

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=30000;
            PRAGMA foreign_keys=ON;
            "#,
        )?;

        Self::probe_vector_extension(&conn);

        Ok(conn)
    }

    /// Check whether a vector-search extension is present
    ///
    /// The `embedding` columns are reserved; nothing in the core reads them,
    /// so an absent extension only costs a log line.
    fn probe_vector_extension(conn: &Connection) {
        match conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0)) {
            Ok(version) => tracing::info!("vector extension available: {}", version),
            Err(e) => tracing::debug!("vector extension not available: {}", e),
        }
    }

    /// Execute a function with the connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a function inside a transaction
    ///
    /// The closure's error aborts the transaction; nothing it wrote is
    /// visible afterwards.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Apply pending migrations for one subsystem after open
    pub fn migrate(&self, subsystem: Subsystem) -> Result<usize> {
        let mut conn = self.conn.lock();
        migrations::apply_pending(&mut conn, subsystem)
    }

    /// Compare applied migration checksums against the embedded files
    pub fn validate_migrations(&self, subsystem: Subsystem) -> Result<Vec<ChecksumMismatch>> {
        let conn = self.conn.lock();
        migrations::validate(&conn, subsystem)
    }

    /// Database file path (`:memory:` for the in-memory store)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Database size in bytes
    pub fn db_size(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let size: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
            [],
            |row| row.get(0),
        )?;
        Ok(size)
    }

    /// Close the underlying connection
    ///
    /// A no-op when other clones of this handle are still alive.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => mutex
                .into_inner()
                .close()
                .map_err(|(_, e)| crate::error::MemoirError::Database(e)),
            Err(_) => Ok(()),
        }
    }
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            conn: self.conn.clone(),
        }
    }
}
