//! Exactly-once write fencing for SQL materializations.
//!
//! Provides the [`FenceStore`] trait over a shared checkpoint table, with
//! [`SqliteFenceStore`] and [`PostgresFenceStore`] implementations. A
//! writer claims a key range, receiving a fence, and may commit
//! checkpoints only while that fence is current.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod lease;
pub mod postgres;
mod protocol;
pub mod retry;
pub mod schema;
pub mod sqlite;

pub use backend::FenceStore;
pub use error::{FenceError, Result};
pub use lease::CheckpointLease;
pub use postgres::PostgresFenceStore;
pub use retry::{with_retry, RetryPolicy};
pub use schema::{CheckpointTable, DEFAULT_TABLE};
pub use sqlite::SqliteFenceStore;

/// Common imports for fence store consumers.
pub mod prelude {
    pub use crate::backend::FenceStore;
    pub use crate::error::{FenceError, Result};
    pub use crate::lease::CheckpointLease;
    pub use crate::postgres::PostgresFenceStore;
    pub use crate::retry::{with_retry, RetryPolicy};
    pub use crate::schema::CheckpointTable;
    pub use crate::sqlite::SqliteFenceStore;
    pub use matsql_types::{Fence, KeyRange, MaterializationName};
}
