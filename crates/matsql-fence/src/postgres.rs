//! `PostgreSQL`-backed implementation of [`FenceStore`].
//!
//! Uses the sync `postgres` crate with a single `Mutex<Client>` for
//! thread safety. The `postgres` crate manages its own internal tokio
//! runtime, so this works from any thread.
//!
//! Claims and commits run in SERIALIZABLE transactions. Under weaker
//! isolation two first claims of overlapping ranges both see no prior row
//! and both commit.

use std::sync::{Mutex, MutexGuard};

use matsql_types::{Fence, KeyRange, MaterializationName};
use postgres::{Client, GenericClient, IsolationLevel, NoTls, Row, Transaction};

use crate::backend::FenceStore;
use crate::error::{self, FenceError};
use crate::protocol::{self, RowStore, StoredRow};
use crate::schema::{CheckpointTable, Dialect, Statements};

/// `PostgreSQL`-backed checkpoint table.
///
/// Create with [`PostgresFenceStore::open`] providing a libpq-style
/// connection string (e.g. `"host=localhost dbname=flow user=postgres"`).
pub struct PostgresFenceStore {
    client: Mutex<Client>,
    statements: Statements,
}

impl PostgresFenceStore {
    /// Connect to a `PostgreSQL` database and create `table` if needed.
    ///
    /// `connstr` is a libpq-style connection string or `PostgreSQL` URI:
    /// - `"host=localhost port=5432 dbname=flow user=postgres"`
    /// - `"postgresql://postgres@localhost/flow"`
    ///
    /// # Errors
    ///
    /// Returns [`FenceError::Backend`] if connection or DDL execution fails.
    pub fn open(connstr: &str, table: &CheckpointTable) -> error::Result<Self> {
        let mut client = Client::connect(connstr, NoTls)
            .map_err(|e| FenceError::backend_context("connect to postgres", e))?;
        client
            .batch_execute(&table.create_sql())
            .map_err(|e| FenceError::backend_context("create checkpoint table", e))?;
        Ok(Self {
            client: Mutex::new(client),
            statements: Statements::new(table, Dialect::Postgres),
        })
    }

    /// Acquire the client lock.
    fn lock_client(&self) -> error::Result<MutexGuard<'_, Client>> {
        self.client.lock().map_err(|_| FenceError::LockPoisoned)
    }
}

/// Start a SERIALIZABLE transaction, as [`claim_in`] and [`commit_in`] require.
///
/// # Errors
///
/// Returns the driver error if `BEGIN` fails.
pub fn serializable(client: &mut Client) -> Result<Transaction<'_>, postgres::Error> {
    client
        .build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
}

impl FenceStore for PostgresFenceStore {
    fn claim(
        &self,
        materialization: &MaterializationName,
        range: KeyRange,
        initial_fence: i64,
        initial_checkpoint: &[u8],
    ) -> error::Result<Fence> {
        let mut client = self.lock_client()?;
        let mut tx = serializable(&mut client)?;
        let fence = protocol::claim(
            &mut PostgresRows::new(&mut tx, &self.statements),
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
        let mut client = self.lock_client()?;
        let mut tx = serializable(&mut client)?;
        protocol::commit(
            &mut PostgresRows::new(&mut tx, &self.statements),
            materialization,
            range,
            fence,
            checkpoint,
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list(&self, materialization: &MaterializationName) -> error::Result<Vec<Fence>> {
        let mut client = self.lock_client()?;
        protocol::list(
            &mut PostgresRows::new(&mut *client, &self.statements),
            materialization,
        )
    }
}

/// Claim `range` inside a caller-owned transaction on `table`.
///
/// `tx` must be SERIALIZABLE (see [`serializable`]); otherwise concurrent
/// claims of overlapping new ranges can both succeed.
///
/// # Errors
///
/// Returns [`FenceError`] on storage failure. A serialization failure here
/// or at commit is transient: roll back and retry.
pub fn claim_in(
    tx: &mut Transaction<'_>,
    table: &CheckpointTable,
    materialization: &MaterializationName,
    range: KeyRange,
    initial_fence: i64,
    initial_checkpoint: &[u8],
) -> error::Result<Fence> {
    let statements = Statements::new(table, Dialect::Postgres);
    protocol::claim(
        &mut PostgresRows::new(tx, &statements),
        materialization,
        range,
        initial_fence,
        initial_checkpoint,
    )
}

/// Commit a checkpoint inside a caller-owned SERIALIZABLE transaction.
///
/// # Errors
///
/// Returns [`FenceError::Fenced`] if `fence` is no longer current. The
/// caller must then roll back `tx`.
pub fn commit_in(
    tx: &mut Transaction<'_>,
    table: &CheckpointTable,
    materialization: &MaterializationName,
    range: KeyRange,
    fence: i64,
    checkpoint: &[u8],
) -> error::Result<()> {
    let statements = Statements::new(table, Dialect::Postgres);
    protocol::commit(
        &mut PostgresRows::new(tx, &statements),
        materialization,
        range,
        fence,
        checkpoint,
    )
}

struct PostgresRows<'a, C> {
    client: &'a mut C,
    sql: &'a Statements,
}

impl<'a, C: GenericClient> PostgresRows<'a, C> {
    fn new(client: &'a mut C, sql: &'a Statements) -> Self {
        Self { client, sql }
    }
}

fn stored_row(row: &Row) -> error::Result<StoredRow> {
    StoredRow::from_columns(row.get(0), row.get(1), row.get(2), row.get(3))
}

impl<C: GenericClient> RowStore for PostgresRows<'_, C> {
    fn bump_overlapping(&mut self, materialization: &str, range: KeyRange) -> error::Result<u64> {
        Ok(self.client.execute(
            self.sql.bump_overlapping.as_str(),
            &[&materialization, &i64::from(range.begin), &i64::from(range.end)],
        )?)
    }

    fn max_overlapping_fence(
        &mut self,
        materialization: &str,
        range: KeyRange,
    ) -> error::Result<Option<i64>> {
        let row = self.client.query_one(
            self.sql.max_overlapping_fence.as_str(),
            &[&materialization, &i64::from(range.begin), &i64::from(range.end)],
        )?;
        Ok(row.get(0))
    }

    fn narrowest_covering(
        &mut self,
        materialization: &str,
        range: KeyRange,
    ) -> error::Result<Option<StoredRow>> {
        self.client
            .query_opt(
                self.sql.narrowest_covering.as_str(),
                &[&materialization, &i64::from(range.begin), &i64::from(range.end)],
            )?
            .as_ref()
            .map(stored_row)
            .transpose()
    }

    fn insert(&mut self, materialization: &str, row: &StoredRow) -> error::Result<()> {
        self.client.execute(
            self.sql.insert.as_str(),
            &[
                &materialization,
                &i64::from(row.range.begin),
                &i64::from(row.range.end),
                &row.fence,
                &row.checkpoint,
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
        self.client.execute(
            self.sql.set_fence.as_str(),
            &[
                &fence,
                &materialization,
                &i64::from(range.begin),
                &i64::from(range.end),
            ],
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
        Ok(self.client.execute(
            self.sql.commit.as_str(),
            &[
                &checkpoint,
                &materialization,
                &i64::from(range.begin),
                &i64::from(range.end),
                &fence,
            ],
        )?)
    }

    fn list(&mut self, materialization: &str) -> error::Result<Vec<StoredRow>> {
        self.client
            .query(self.sql.list.as_str(), &[&materialization])?
            .iter()
            .map(stored_row)
            .collect()
    }
}
