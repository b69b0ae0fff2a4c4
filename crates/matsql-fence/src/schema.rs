//! Checkpoint table naming, DDL, and per-dialect statements.

use std::fmt;

use crate::error::{FenceError, Result};

/// Table name used when none is configured.
pub const DEFAULT_TABLE: &str = "flow_checkpoints_v1";

/// A validated checkpoint table name, safe to interpolate into SQL.
///
/// Accepts `table` or `schema.table`, where each part is an ASCII
/// identifier starting with a letter or underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointTable(String);

impl CheckpointTable {
    /// # Errors
    ///
    /// Returns [`FenceError::InvalidTableName`] for anything but a plain
    /// identifier with at most one schema qualifier.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
            return Err(FenceError::InvalidTableName(name));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Idempotent DDL, valid for both `SQLite` and `PostgreSQL`.
    #[must_use]
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    materialization TEXT NOT NULL,
    key_begin BIGINT NOT NULL,
    key_end BIGINT NOT NULL,
    fence BIGINT NOT NULL,
    checkpoint TEXT NOT NULL,
    PRIMARY KEY (materialization, key_begin, key_end)
)",
            self.0
        )
    }
}

impl Default for CheckpointTable {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_string())
    }
}

impl fmt::Display for CheckpointTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => format!("?{index}"),
            Self::Postgres => format!("${index}"),
        }
    }
}

/// Statements of the claim/commit protocol for one table and dialect.
///
/// Key ranges are inclusive on both ends.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    /// Params: materialization, begin, end.
    pub bump_overlapping: String,
    /// Params: materialization, begin, end.
    pub max_overlapping_fence: String,
    /// Params: materialization, begin, end.
    pub narrowest_covering: String,
    /// Params: materialization, begin, end, fence, checkpoint.
    pub insert: String,
    /// Params: fence, materialization, begin, end.
    pub set_fence: String,
    /// Params: checkpoint, materialization, begin, end, fence.
    pub commit: String,
    /// Params: materialization.
    pub list: String,
}

impl Statements {
    pub(crate) fn new(table: &CheckpointTable, dialect: Dialect) -> Self {
        let p = |i| dialect.placeholder(i);
        let overlaps = format!(
            "materialization = {} AND key_end >= {} AND key_begin <= {}",
            p(1),
            p(2),
            p(3)
        );
        let exact = |first: usize| {
            format!(
                "materialization = {} AND key_begin = {} AND key_end = {}",
                p(first),
                p(first + 1),
                p(first + 2)
            )
        };

        Self {
            bump_overlapping: format!("UPDATE {table} SET fence = fence + 1 WHERE {overlaps}"),
            max_overlapping_fence: format!("SELECT MAX(fence) FROM {table} WHERE {overlaps}"),
            narrowest_covering: format!(
                "SELECT key_begin, key_end, fence, checkpoint FROM {table} \
                 WHERE materialization = {} AND key_begin <= {} AND key_end >= {} \
                 ORDER BY key_end - key_begin ASC LIMIT 1",
                p(1),
                p(2),
                p(3)
            ),
            insert: format!(
                "INSERT INTO {table} (materialization, key_begin, key_end, fence, checkpoint) \
                 VALUES ({}, {}, {}, {}, {})",
                p(1),
                p(2),
                p(3),
                p(4),
                p(5)
            ),
            set_fence: format!("UPDATE {table} SET fence = {} WHERE {}", p(1), exact(2)),
            commit: format!(
                "UPDATE {table} SET checkpoint = {} WHERE {} AND fence = {}",
                p(1),
                exact(2),
                p(5)
            ),
            list: format!(
                "SELECT key_begin, key_end, fence, checkpoint FROM {table} \
                 WHERE materialization = {} ORDER BY key_begin, key_end",
                p(1)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        for name in ["flow_checkpoints_v1", "public.flow_checkpoints_v1", "_t", "S1.T2"] {
            assert!(CheckpointTable::new(name).is_ok(), "name: {name}");
        }
    }

    #[test]
    fn rejects_injection_and_odd_names() {
        for name in [
            "",
            "a.b.c",
            "1table",
            "t; DROP TABLE users",
            "t--",
            "\"quoted\"",
            "schema.",
        ] {
            assert!(
                matches!(CheckpointTable::new(name), Err(FenceError::InvalidTableName(_))),
                "name: {name}"
            );
        }
    }

    #[test]
    fn default_table() {
        assert_eq!(CheckpointTable::default().as_str(), DEFAULT_TABLE);
    }

    #[test]
    fn placeholders_follow_dialect() {
        let table = CheckpointTable::default();
        let sqlite = Statements::new(&table, Dialect::Sqlite);
        let pg = Statements::new(&table, Dialect::Postgres);

        assert_eq!(
            sqlite.commit,
            "UPDATE flow_checkpoints_v1 SET checkpoint = ?1 WHERE materialization = ?2 \
             AND key_begin = ?3 AND key_end = ?4 AND fence = ?5"
        );
        assert!(pg.bump_overlapping.ends_with("key_end >= $2 AND key_begin <= $3"));
        assert!(pg.narrowest_covering.contains("ORDER BY key_end - key_begin ASC LIMIT 1"));
    }
}
