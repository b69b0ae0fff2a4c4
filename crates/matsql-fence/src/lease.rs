//! A claimed key range held by one writer.

use matsql_types::{Fence, KeyRange, MaterializationName};

use crate::backend::FenceStore;
use crate::error::{FenceError, Result};

/// Ownership of a key range, obtained by claiming it on a [`FenceStore`].
///
/// Every [`commit`](Self::commit) is conditioned on the claimed fence.
/// Once a commit reports the lease fenced off, all later commits fail
/// without touching the store.
pub struct CheckpointLease<'s, S: FenceStore + ?Sized> {
    store: &'s S,
    fence: Fence,
    fenced: bool,
}

impl<'s, S: FenceStore + ?Sized> CheckpointLease<'s, S> {
    /// Claim `range` and hold the resulting fence.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError`] if the claim fails.
    pub fn open(
        store: &'s S,
        materialization: &MaterializationName,
        range: KeyRange,
        initial_fence: i64,
        initial_checkpoint: &[u8],
    ) -> Result<Self> {
        let fence = store.claim(materialization, range, initial_fence, initial_checkpoint)?;
        tracing::info!(
            materialization = %materialization,
            range = %range,
            fence = fence.fence,
            "Opened checkpoint lease"
        );
        Ok(Self {
            store,
            fence,
            fenced: false,
        })
    }

    #[must_use]
    pub fn fence(&self) -> i64 {
        self.fence.fence
    }

    /// The last checkpoint this lease committed, or the one it resumed from.
    #[must_use]
    pub fn checkpoint(&self) -> &[u8] {
        &self.fence.checkpoint
    }

    #[must_use]
    pub fn range(&self) -> KeyRange {
        self.fence.range
    }

    #[must_use]
    pub fn materialization(&self) -> &MaterializationName {
        &self.fence.materialization
    }

    #[must_use]
    pub fn is_fenced(&self) -> bool {
        self.fenced
    }

    /// Persist `checkpoint` under this lease's fence.
    ///
    /// # Errors
    ///
    /// Returns [`FenceError::Fenced`] once another writer has claimed an
    /// overlapping range, or a storage error.
    pub fn commit(&mut self, checkpoint: &[u8]) -> Result<()> {
        if self.fenced {
            return Err(self.fenced_error());
        }
        match self.store.commit(
            &self.fence.materialization,
            self.fence.range,
            self.fence.fence,
            checkpoint,
        ) {
            Ok(()) => {
                self.fence.checkpoint = checkpoint.to_vec();
                Ok(())
            }
            Err(err) => {
                if err.is_fenced() {
                    self.fenced = true;
                }
                Err(err)
            }
        }
    }

    fn fenced_error(&self) -> FenceError {
        FenceError::Fenced {
            materialization: self.fence.materialization.clone(),
            key_begin: self.fence.range.begin,
            key_end: self.fence.range.end,
            fence: self.fence.fence,
        }
    }
}

impl<S: FenceStore + ?Sized> std::fmt::Debug for CheckpointLease<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointLease")
            .field("fence", &self.fence)
            .field("fenced", &self.fenced)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CheckpointTable;
    use crate::sqlite::SqliteFenceStore;

    #[test]
    fn commit_updates_held_checkpoint() {
        let store = SqliteFenceStore::in_memory(&CheckpointTable::default()).unwrap();
        let mat = MaterializationName::new("acme/mat");
        let mut lease = CheckpointLease::open(&store, &mat, KeyRange::FULL, 1, b"start").unwrap();
        assert_eq!(lease.checkpoint(), b"start");

        lease.commit(b"next").unwrap();
        assert_eq!(lease.checkpoint(), b"next");
        assert_eq!(lease.range(), KeyRange::FULL);
        assert_eq!(lease.materialization(), &mat);
    }

    #[test]
    fn superseded_lease_stays_fenced() {
        let store = SqliteFenceStore::in_memory(&CheckpointTable::default()).unwrap();
        let mat = MaterializationName::new("acme/mat");
        let mut old = CheckpointLease::open(&store, &mat, KeyRange::FULL, 1, b"").unwrap();
        let mut new = CheckpointLease::open(&store, &mat, KeyRange::FULL, 1, b"").unwrap();
        assert!(new.fence() > old.fence());

        assert!(old.commit(b"late").unwrap_err().is_fenced());
        assert!(old.is_fenced());
        assert!(old.commit(b"again").unwrap_err().is_fenced());

        new.commit(b"ok").unwrap();
        assert!(!new.is_fenced());
    }

    #[test]
    fn works_through_trait_object() {
        let store = SqliteFenceStore::in_memory(&CheckpointTable::default()).unwrap();
        let dyn_store: &dyn FenceStore = &store;
        let mat = MaterializationName::new("acme/mat");
        let mut lease = CheckpointLease::open(dyn_store, &mat, KeyRange::FULL, 1, b"").unwrap();
        lease.commit(b"cp").unwrap();
        assert!(format!("{lease:?}").contains("CheckpointLease"));
    }
}
