//! `SQLite`-backed implementation of [`FenceStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Each claim runs in a
//! `BEGIN IMMEDIATE` transaction so concurrent processes sharing the
//! database file serialize on the write lock rather than deadlocking on
//! upgrade.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use matsql_types::{Fence, KeyRange, MaterializationName};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::backend::FenceStore;
use crate::error::{self, FenceError};
use crate::protocol::{self, RowStore, StoredRow};
use crate::schema::{CheckpointTable, Dialect, Statements};

/// How long a connection waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-backed checkpoint table.
///
/// Create with [`SqliteFenceStore::open`] for file-backed persistence
/// or [`SqliteFenceStore::in_memory`] for tests.
pub struct SqliteFenceStore {
    conn: Mutex<Connection>,
    statements: Statements,
}

impl SqliteFenceStore {
    /// Open or create a `SQLite` database at `path` holding `table`.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError::Io`] if the directory can't be created,
    /// or [`FenceError::Backend`] if the database can't be opened.
    pub fn open(path: &Path, table: &CheckpointTable) -> error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| FenceError::backend_context("open sqlite database", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| FenceError::backend_context("set busy timeout", e))?;
        Self::init(conn, table)
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`FenceError::Backend`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory(table: &CheckpointTable) -> error::Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FenceError::backend_context("open in-memory database", e))?;
        Self::init(conn, table)
    }

    fn init(conn: Connection, table: &CheckpointTable) -> error::Result<Self> {
        conn.execute_batch(&table.create_sql())
            .map_err(|e| FenceError::backend_context("create checkpoint table", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
            statements: Statements::new(table, Dialect::Sqlite),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FenceError::LockPoisoned)
    }
}

impl FenceStore for SqliteFenceStore {
    fn claim(
        &self,
        materialization: &MaterializationName,
        range: KeyRange,
        initial_fence: i64,
        initial_checkpoint: &[u8],
    ) -> error::Result<Fence> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let fence = protocol::claim(
            &mut SqliteRows::new(&tx, &self.statements),
            materialization,
            range,
            initial_fence,
            initial_checkpoint,
        )?;
        tx.commit()?;
        Ok(fence)
    }

    fn commit(
        &self,
        materialization: &MaterializationName,
        range: KeyRange,
        fence: i64,
        checkpoint: &[u8],
    ) -> error::Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        protocol::commit(
            &mut SqliteRows::new(&tx, &self.statements),
            materialization,
            range,
            fence,
            checkpoint,
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list(&self, materialization: &MaterializationName) -> error::Result<Vec<Fence>> {
        let conn = self.lock_conn()?;
        protocol::list(&mut SqliteRows::new(&conn, &self.statements), materialization)
    }
}

/// Claim `range` inside a caller-owned transaction on `table`.
///
/// The caller commits `tx`; nothing is persisted otherwise.
///
/// # Errors
///
/// Returns [`FenceError`] on storage failure.
pub fn claim_in(
    tx: &Transaction<'_>,
    table: &CheckpointTable,
    materialization: &MaterializationName,
    range: KeyRange,
    initial_fence: i64,
    initial_checkpoint: &[u8],
) -> error::Result<Fence> {
    let statements = Statements::new(table, Dialect::Sqlite);
    protocol::claim(
        &mut SqliteRows::new(tx, &statements),
        materialization,
        range,
        initial_fence,
        initial_checkpoint,
    )
}

/// Commit a checkpoint inside a caller-owned transaction, typically the one
/// that also wrote the data the checkpoint describes.
///
/// # Errors
///
/// Returns [`FenceError::Fenced`] if `fence` is no longer current. The
/// caller must then roll back `tx`.
pub fn commit_in(
    tx: &Transaction<'_>,
    table: &CheckpointTable,
    materialization: &MaterializationName,
    range: KeyRange,
    fence: i64,
    checkpoint: &[u8],
) -> error::Result<()> {
    let statements = Statements::new(table, Dialect::Sqlite);
    protocol::commit(
        &mut SqliteRows::new(tx, &statements),
        materialization,
        range,
        fence,
        checkpoint,
    )
}

struct SqliteRows<'a> {
    conn: &'a Connection,
    sql: &'a Statements,
}

impl<'a> SqliteRows<'a> {
    fn new(conn: &'a Connection, sql: &'a Statements) -> Self {
        Self { conn, sql }
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, i64, i64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl RowStore for SqliteRows<'_> {
    fn bump_overlapping(&mut self, materialization: &str, range: KeyRange) -> error::Result<u64> {
        let n = self.conn.execute(
            &self.sql.bump_overlapping,
            params![materialization, i64::from(range.begin), i64::from(range.end)],
        )?;
        Ok(n as u64)
    }

    fn max_overlapping_fence(
        &mut self,
        materialization: &str,
        range: KeyRange,
    ) -> error::Result<Option<i64>> {
        let max = self.conn.query_row(
            &self.sql.max_overlapping_fence,
            params![materialization, i64::from(range.begin), i64::from(range.end)],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn narrowest_covering(
        &mut self,
        materialization: &str,
        range: KeyRange,
    ) -> error::Result<Option<StoredRow>> {
        let found = self
            .conn
            .query_row(
                &self.sql.narrowest_covering,
                params![materialization, i64::from(range.begin), i64::from(range.end)],
                read_row,
            )
            .optional()?;
        found
            .map(|(begin, end, fence, checkpoint)| {
                StoredRow::from_columns(begin, end, fence, checkpoint)
            })
            .transpose()
    }

    fn insert(&mut self, materialization: &str, row: &StoredRow) -> error::Result<()> {
        self.conn.execute(
            &self.sql.insert,
            params![
                materialization,
                i64::from(row.range.begin),
                i64::from(row.range.end),
                row.fence,
                row.checkpoint,
            ],
        )?;
        Ok(())
    }

    fn set_fence(
        &mut self,
        materialization: &str,
        range: KeyRange,
        fence: i64,
    ) -> error::Result<()> {
        self.conn.execute(
            &self.sql.set_fence,
            params![fence, materialization, i64::from(range.begin), i64::from(range.end)],
        )?;
        Ok(())
    }

    fn update_checkpoint(
        &mut self,
        materialization: &str,
        range: KeyRange,
        fence: i64,
        checkpoint: &str,
    ) -> error::Result<u64> {
        let n = self.conn.execute(
            &self.sql.commit,
            params![
                checkpoint,
                materialization,
                i64::from(range.begin),
                i64::from(range.end),
                fence,
            ],
        )?;
        Ok(n as u64)
    }

    fn list(&mut self, materialization: &str) -> error::Result<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare(&self.sql.list)?;
        let rows = stmt
            .query_map(params![materialization], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(begin, end, fence, checkpoint)| {
                StoredRow::from_columns(begin, end, fence, checkpoint)
            })
            .collect()
    }
}
