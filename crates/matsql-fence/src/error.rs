//! Fence store error types.

use matsql_types::{InvalidKeyRange, MaterializationName};
use postgres::error::SqlState;
use rusqlite::ErrorCode;

/// Errors produced by [`FenceStore`](crate::FenceStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum FenceError {
    /// Another writer claimed an overlapping range since this fence was
    /// issued. The holder must stop writing.
    #[error(
        "materialization '{materialization}' key range [{key_begin:08x}, {key_end:08x}] was \
         fenced off: fence {fence} is no longer current"
    )]
    Fenced {
        materialization: MaterializationName,
        key_begin: u32,
        key_end: u32,
        fence: i64,
    },

    #[error(transparent)]
    InvalidRange(#[from] InvalidKeyRange),

    /// Checkpoint table name is not a plain, optionally schema-qualified,
    /// identifier.
    #[error("invalid checkpoint table name '{0}'")]
    InvalidTableName(String),

    /// A stored key bound does not fit the 32-bit key space.
    #[error("stored {column} {value} is outside the key space")]
    CorruptRow { column: &'static str, value: i64 },

    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Underlying `PostgreSQL` failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    /// A stored checkpoint is not valid base64.
    #[error("invalid stored checkpoint: {0}")]
    Checkpoint(#[from] base64::DecodeError),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("fence store lock poisoned")]
    LockPoisoned,

    /// Backend failure tagged with the step that failed.
    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: Box<FenceError>,
    },
}

impl FenceError {
    /// Wrap a backend error with the step that produced it.
    pub fn backend_context(context: &'static str, source: impl Into<FenceError>) -> Self {
        Self::Backend {
            context,
            source: Box::new(source.into()),
        }
    }

    /// The writer holding the fence has been superseded.
    #[must_use]
    pub fn is_fenced(&self) -> bool {
        match self {
            Self::Fenced { .. } => true,
            Self::Backend { source, .. } => source.is_fenced(),
            _ => false,
        }
    }

    /// Contention or connectivity failures worth retrying with the same
    /// arguments.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            Self::Postgres(err) => {
                err.is_closed()
                    || err.code().is_some_and(|code| {
                        *code == SqlState::T_R_SERIALIZATION_FAILURE
                            || *code == SqlState::T_R_DEADLOCK_DETECTED
                            || *code == SqlState::UNIQUE_VIOLATION
                    })
            }
            Self::Backend { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, FenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn fenced_displays_range_and_fence() {
        let err = FenceError::Fenced {
            materialization: "acme/mat".into(),
            key_begin: 0,
            key_end: u32::MAX,
            fence: 7,
        };
        assert!(err.is_fenced());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "materialization 'acme/mat' key range [00000000, ffffffff] was fenced off: \
             fence 7 is no longer current"
        );
    }

    #[test]
    fn busy_sqlite_is_transient() {
        let busy = FenceError::Sqlite(sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        assert!(busy.is_transient());

        let locked = FenceError::Sqlite(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED));
        assert!(locked.is_transient());

        let constraint = FenceError::Sqlite(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert!(!constraint.is_transient());
    }

    #[test]
    fn context_preserves_classification() {
        let err = FenceError::backend_context(
            "claim: bump fences",
            sqlite_failure(rusqlite::ffi::SQLITE_BUSY),
        );
        assert!(err.is_transient());
        assert!(err.to_string().starts_with("claim: bump fences: sqlite error"));
    }

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(FenceError::LockPoisoned.to_string(), "fence store lock poisoned");
    }
}
