//! Fence store trait definition.
//!
//! [`FenceStore`] defines the contract over a shared checkpoint table.
//! Model types live in [`matsql_types::fence`].

use matsql_types::{Fence, KeyRange, MaterializationName};

use crate::error;

/// Storage contract for write fencing.
///
/// Each operation runs in its own transaction. Use the backend's
/// `claim_in`/`commit_in` functions to share a transaction with data writes.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn FenceStore>`.
pub trait FenceStore: Send + Sync {
    /// Claim `range` of `materialization`, fencing off every writer holding
    /// an overlapping range.
    ///
    /// `initial_fence` and `initial_checkpoint` seed the row when no stored
    /// range covers `range`.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError`](crate::error::FenceError) on storage failure.
    fn claim(
        &self,
        materialization: &MaterializationName,
        range: KeyRange,
        initial_fence: i64,
        initial_checkpoint: &[u8],
    ) -> error::Result<Fence>;

    /// Persist `checkpoint` for exactly `range`, provided `fence` is still
    /// the stored fence.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError::Fenced`](crate::error::FenceError::Fenced) if
    /// the fence has moved on, or another
    /// [`FenceError`](crate::error::FenceError) on storage failure.
    fn commit(
        &self,
        materialization: &MaterializationName,
        range: KeyRange,
        fence: i64,
        checkpoint: &[u8],
    ) -> error::Result<()>;

    /// All stored rows of `materialization`, ordered by range.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError`](crate::error::FenceError) on storage failure.
    fn list(&self, materialization: &MaterializationName) -> error::Result<Vec<Fence>>;
}
