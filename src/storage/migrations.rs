//! Embedded schema migrations with per-subsystem tracking
//!
//! Each subsystem (`memory`, `history`) carries its own ordered set of SQL
//! files compiled into the binary, and its own tracking table
//! `x_{subsystem}_migrations`. Both subsystems may share one database file;
//! the tracking tables keep their applied sets disjoint.
//!
//! Every migration step runs in its own transaction: the DDL and the
//! tracking row commit together, so a failure leaves the database at the
//! previous version.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::error::{MemoirError, Result};

/// A logical schema owned by one part of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Memory,
    History,
}

impl Subsystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Memory => "memory",
            Subsystem::History => "history",
        }
    }

    /// Name of this subsystem's tracking table
    pub fn tracking_table(&self) -> String {
        format!("x_{}_migrations", self.as_str())
    }

    fn sources(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Subsystem::Memory => MEMORY_SOURCES,
            Subsystem::History => HISTORY_SOURCES,
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const MEMORY_SOURCES: &[(&str, &str)] = &[(
    "0001_initial_schema.sql",
    include_str!("../../migrations/memory/0001_initial_schema.sql"),
)];

const HISTORY_SOURCES: &[(&str, &str)] = &[(
    "0001_initial_schema.sql",
    include_str!("../../migrations/history/0001_initial_schema.sql"),
)];

/// One embedded migration, parsed from its filename
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub filename: &'static str,
    /// Human-readable form of the snake_case filename description
    pub description: String,
    pub sql: &'static str,
    pub checksum: String,
}

/// A stored checksum that no longer matches the embedded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub version: i64,
    pub filename: String,
    pub expected: String,
    pub stored: String,
}

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4,})_([a-z0-9_]+)\.sql$").unwrap());

/// Hex-rendered SHA-256 of migration file contents
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_source(filename: &'static str, sql: &'static str) -> Result<Migration> {
    let caps = FILENAME_RE
        .captures(filename)
        .ok_or_else(|| MemoirError::MigrationFilename(filename.to_string()))?;

    let version: i64 = caps[1]
        .parse()
        .map_err(|_| MemoirError::MigrationFilename(filename.to_string()))?;
    let description = caps[2].replace('_', " ");

    Ok(Migration {
        version,
        filename,
        description,
        sql,
        checksum: checksum(sql),
    })
}

/// All embedded migrations for a subsystem, sorted by version
pub fn migrations_for(subsystem: Subsystem) -> Result<Vec<Migration>> {
    let mut migrations = subsystem
        .sources()
        .iter()
        .map(|(filename, sql)| parse_source(filename, sql))
        .collect::<Result<Vec<_>>>()?;
    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Highest applied version for a subsystem, or 0 when nothing has run
pub fn current_version(conn: &Connection, subsystem: Subsystem) -> Result<i64> {
    let table = subsystem.tracking_table();
    if !table_exists(conn, &table)? {
        return Ok(0);
    }
    let version: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {}", table),
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn ensure_tracking_table(conn: &Connection, subsystem: Subsystem) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch()),
                checksum TEXT NOT NULL
            )",
            subsystem.tracking_table()
        ),
        [],
    )?;
    Ok(())
}

/// Apply every embedded migration above the current version
///
/// Returns the number of migrations applied. Each step commits its DDL and
/// tracking row atomically; on failure the subsystem stays at the previous
/// version and later steps are not attempted.
pub fn apply_pending(conn: &mut Connection, subsystem: Subsystem) -> Result<usize> {
    ensure_tracking_table(conn, subsystem)?;
    let current = current_version(conn, subsystem)?;
    let table = subsystem.tracking_table();

    let mut applied = 0;
    for migration in migrations_for(subsystem)? {
        if migration.version <= current {
            continue;
        }

        let now = chrono::Utc::now().timestamp();
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            &format!(
                "INSERT INTO {} (version, filename, applied_at, checksum)
                 VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![
                migration.version,
                migration.filename,
                now,
                migration.checksum
            ],
        )?;
        tx.commit()?;

        tracing::debug!(
            subsystem = subsystem.as_str(),
            version = migration.version,
            "applied migration: {}",
            migration.description
        );
        applied += 1;
    }

    Ok(applied)
}

/// Compare stored checksums against the embedded files
///
/// Returns one entry per applied migration whose stored checksum diverges
/// from the current embedded content. Policy is the caller's call.
pub fn validate(conn: &Connection, subsystem: Subsystem) -> Result<Vec<ChecksumMismatch>> {
    let table = subsystem.tracking_table();
    if !table_exists(conn, &table)? {
        return Ok(Vec::new());
    }

    let embedded = migrations_for(subsystem)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT version, filename, checksum FROM {} ORDER BY version",
        table
    ))?;
    let stored: Vec<(i64, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut mismatches = Vec::new();
    for (version, filename, stored_checksum) in stored {
        let Some(migration) = embedded.iter().find(|m| m.version == version) else {
            continue;
        };
        if migration.checksum != stored_checksum {
            tracing::warn!(
                subsystem = subsystem.as_str(),
                version,
                "migration checksum mismatch"
            );
            mismatches.push(ChecksumMismatch {
                version,
                filename,
                expected: migration.checksum.clone(),
                stored: stored_checksum,
            });
        }
    }
    Ok(mismatches)
}
