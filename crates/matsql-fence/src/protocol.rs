//! The claim/commit protocol, written once over a minimal row interface
//! that each backend implements on its own transaction type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use matsql_types::{Fence, KeyRange, MaterializationName};

use crate::error::{FenceError, Result};

/// A checkpoint-table row as stored: checkpoint still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredRow {
    pub range: KeyRange,
    pub fence: i64,
    pub checkpoint: String,
}

impl StoredRow {
    pub(crate) fn from_columns(
        key_begin: i64,
        key_end: i64,
        fence: i64,
        checkpoint: String,
    ) -> Result<Self> {
        let bound = |column, value: i64| {
            u32::try_from(value).map_err(|_| FenceError::CorruptRow { column, value })
        };
        let range = KeyRange::new(bound("key_begin", key_begin)?, bound("key_end", key_end)?)?;
        Ok(Self {
            range,
            fence,
            checkpoint,
        })
    }

    pub(crate) fn into_fence(self, materialization: &MaterializationName) -> Result<Fence> {
        Ok(Fence {
            materialization: materialization.clone(),
            range: self.range,
            fence: self.fence,
            checkpoint: STANDARD.decode(self.checkpoint)?,
        })
    }
}

/// Row operations the protocol needs, scoped to one open transaction.
pub(crate) trait RowStore {
    /// Increment the fence of every row overlapping `range`.
    fn bump_overlapping(&mut self, materialization: &str, range: KeyRange) -> Result<u64>;

    fn max_overlapping_fence(&mut self, materialization: &str, range: KeyRange)
        -> Result<Option<i64>>;

    /// The narrowest row fully containing `range`.
    fn narrowest_covering(
        &mut self,
        materialization: &str,
        range: KeyRange,
    ) -> Result<Option<StoredRow>>;

    fn insert(&mut self, materialization: &str, row: &StoredRow) -> Result<()>;

    fn set_fence(&mut self, materialization: &str, range: KeyRange, fence: i64) -> Result<()>;

    /// Replace the checkpoint of the exact row `range` if its fence is
    /// still `fence`. Returns the number of rows updated.
    fn update_checkpoint(
        &mut self,
        materialization: &str,
        range: KeyRange,
        fence: i64,
        checkpoint: &str,
    ) -> Result<u64>;

    fn list(&mut self, materialization: &str) -> Result<Vec<StoredRow>>;
}

/// Claim exclusive ownership of `range`.
///
/// Every overlapping row has its fence bumped, fencing off any writer
/// holding it. The claimed row's fence is then raised to at least the
/// highest overlapping fence, so a claim always supersedes every earlier
/// claim it overlaps. An exact row is reused; otherwise a new row inherits
/// the checkpoint of the narrowest covering row, or starts from the
/// initial fence and checkpoint when nothing covers it.
pub(crate) fn claim(
    store: &mut impl RowStore,
    materialization: &MaterializationName,
    range: KeyRange,
    initial_fence: i64,
    initial_checkpoint: &[u8],
) -> Result<Fence> {
    let name = materialization.as_str();

    let bumped = store
        .bump_overlapping(name, range)
        .map_err(|e| FenceError::backend_context("claim: bump overlapping fences", e))?;
    let highest = store
        .max_overlapping_fence(name, range)
        .map_err(|e| FenceError::backend_context("claim: read overlapping fences", e))?;
    let covering = store
        .narrowest_covering(name, range)
        .map_err(|e| FenceError::backend_context("claim: find covering range", e))?;

    let row = match covering {
        Some(mut row) if row.range == range => {
            if let Some(highest) = highest.filter(|h| *h > row.fence) {
                store
                    .set_fence(name, range, highest)
                    .map_err(|e| FenceError::backend_context("claim: raise fence", e))?;
                row.fence = highest;
            }
            row
        }
        Some(parent) => {
            let row = StoredRow {
                range,
                fence: highest.map_or(parent.fence, |h| h.max(parent.fence)),
                checkpoint: parent.checkpoint,
            };
            tracing::debug!(
                materialization = name,
                parent = %parent.range,
                range = %range,
                "Splitting covering key range"
            );
            store
                .insert(name, &row)
                .map_err(|e| FenceError::backend_context("claim: insert split range", e))?;
            row
        }
        None => {
            let row = StoredRow {
                range,
                fence: highest.map_or(initial_fence, |h| h.max(initial_fence)),
                checkpoint: STANDARD.encode(initial_checkpoint),
            };
            store
                .insert(name, &row)
                .map_err(|e| FenceError::backend_context("claim: insert new range", e))?;
            row
        }
    };

    tracing::debug!(
        materialization = name,
        range = %range,
        fence = row.fence,
        overlapping = bumped,
        "Claimed key range"
    );
    row.into_fence(materialization)
}

/// Store `checkpoint` for `range` only if `fence` is still current.
///
/// # Errors
///
/// Returns [`FenceError::Fenced`] if another claim has bumped the fence.
pub(crate) fn commit(
    store: &mut impl RowStore,
    materialization: &MaterializationName,
    range: KeyRange,
    fence: i64,
    checkpoint: &[u8],
) -> Result<()> {
    let updated = store
        .update_checkpoint(
            materialization.as_str(),
            range,
            fence,
            &STANDARD.encode(checkpoint),
        )
        .map_err(|e| FenceError::backend_context("commit: update checkpoint", e))?;

    if updated == 0 {
        tracing::warn!(
            materialization = %materialization,
            range = %range,
            fence,
            "Commit rejected: fence is no longer current"
        );
        return Err(FenceError::Fenced {
            materialization: materialization.clone(),
            key_begin: range.begin,
            key_end: range.end,
            fence,
        });
    }
    Ok(())
}

pub(crate) fn list(
    store: &mut impl RowStore,
    materialization: &MaterializationName,
) -> Result<Vec<Fence>> {
    store
        .list(materialization.as_str())
        .map_err(|e| FenceError::backend_context("list: read rows", e))?
        .into_iter()
        .map(|row| row.into_fence(materialization))
        .collect()
}
