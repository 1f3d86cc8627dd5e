//! Durable per-project state and rephrase cache.
//!
//! Both live in one SQLite file with two tables, `state` and `cache`, keyed by
//! `(project_id, key)` with a JSON-encoded value. Hook processes are short
//! lived and may overlap, so the connection waits on the SQLite file lock
//! rather than failing, and read-modify-write operations run inside an
//! `IMMEDIATE` transaction.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::{Serialize, de::DeserializeOwned};

pub use cache::*;
pub use state::*;

mod cache;
mod state;

/// How long a process waits for another process to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS state (
        project_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (project_id, key)
    );
    CREATE TABLE IF NOT EXISTS cache (
        project_id TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (project_id, key)
    );
";

/// Get the project directories for the application.
#[tracing::instrument]
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "bumpers", "bumpers")
}

/// The default database location inside the user's data directory.
pub fn default_database_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("bumpers.db"))
}

/// The tables in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// Operator state (`state:*` keys).
    State,

    /// Rephrased messages (`ai:*` keys).
    Cache,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::State => "state",
            Table::Cache => "cache",
        }
    }
}

/// A handle on the store, scoped to one project.
///
/// The connection closes when the handle is dropped.
#[derive(Debug)]
pub struct Storage {
    conn: Connection,
    project_id: String,
}

impl Storage {
    /// Open (creating if needed) the store at `path` for the given project.
    #[tracing::instrument(skip(project_id))]
    pub fn open(path: &Path, project_id: impl Into<String>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create database directory: {parent:?}"))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open database: {path:?}"))?;
        Self::init(conn, project_id.into())
    }

    /// Open a private in-memory store; nothing persists past the handle.
    pub fn open_in_memory(project_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::init(conn, project_id.into())
    }

    fn init(conn: Connection, project_id: String) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("set database busy timeout")?;
        let journal_mode = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("enable write-ahead logging")?;
        tracing::trace!(%journal_mode, "opened database");
        conn.execute_batch(SCHEMA).context("create tables")?;
        Ok(Self { conn, project_id })
    }

    /// The project this handle reads and writes.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Read and decode a value.
    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>> {
        get_in(&self.conn, &self.project_id, table, key)
    }

    /// Encode and write a value, replacing any previous one.
    pub fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<()> {
        put_in(&self.conn, &self.project_id, table, key, value)
    }

    /// Delete a value; deleting a missing key is not an error.
    pub fn delete(&self, table: Table, key: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE project_id = ?1 AND key = ?2",
            table.name()
        );
        self.conn
            .execute(&sql, params![self.project_id, key])
            .with_context(|| format!("delete {key}"))?;
        Ok(())
    }

    /// Atomically read a boolean and reset it to `false`.
    ///
    /// Returns the value before the reset. When several processes race, at
    /// most one of them observes `true`.
    #[tracing::instrument(skip(self))]
    pub fn consume(&self, table: Table, key: &str) -> Result<bool> {
        let tx = self.immediate()?;
        let value = get_in::<bool>(&tx, &self.project_id, table, key)?.unwrap_or(false);
        if value {
            put_in(&tx, &self.project_id, table, key, &false)?;
        }
        tx.commit().with_context(|| format!("commit consume of {key}"))?;
        Ok(value)
    }

    /// Drop a table, so later reads and writes against it fail.
    #[cfg(test)]
    pub(crate) fn drop_table(&self, table: Table) -> Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE {}", table.name()))
            .context("drop table")
    }

    /// Start a transaction that takes the write lock up front.
    fn immediate(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("begin immediate transaction")
    }

    /// Every `(key, raw value)` pair in a table whose key starts with `prefix`.
    fn scan_prefix(
        conn: &Connection,
        project_id: &str,
        table: Table,
        prefix: &str,
    ) -> Result<Vec<(String, String)>> {
        let sql = format!(
            "SELECT key, value FROM {} WHERE project_id = ?1 AND substr(key, 1, ?2) = ?3",
            table.name()
        );
        let mut stmt = conn.prepare(&sql).context("prepare prefix scan")?;
        let rows = stmt
            .query_map(params![project_id, prefix.len() as i64, prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("scan keys")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read scanned rows")
    }
}

fn get_in<T: DeserializeOwned>(
    conn: &Connection,
    project_id: &str,
    table: Table,
    key: &str,
) -> Result<Option<T>> {
    let sql = format!(
        "SELECT value FROM {} WHERE project_id = ?1 AND key = ?2",
        table.name()
    );
    let raw = conn
        .query_row(&sql, params![project_id, key], |row| row.get::<_, String>(0))
        .optional()
        .with_context(|| format!("read {key}"))?;

    raw.map(|raw| serde_json::from_str(&raw).with_context(|| format!("decode {key}: {raw}")))
        .transpose()
}

fn put_in<T: Serialize>(
    conn: &Connection,
    project_id: &str,
    table: Table,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
    let sql = format!(
        "INSERT INTO {} (project_id, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (project_id, key) DO UPDATE SET value = excluded.value",
        table.name()
    );
    conn.execute(&sql, params![project_id, key, raw])
        .with_context(|| format!("write {key}"))?;
    Ok(())
}
