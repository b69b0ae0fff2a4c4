//! Checkpoint-table rows and key ranges.
//!
//! A [`Fence`] is one row of the checkpoint table: the epoch currently
//! owning a [`KeyRange`] of a materialization, and the opaque checkpoint
//! committed under that epoch.

use serde::{Deserialize, Serialize};

use crate::names::MaterializationName;

/// Inclusive range `[begin, end]` over the 32-bit key hash space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyRange {
    pub begin: u32,
    pub end: u32,
}

/// Returned when `begin > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyRange {
    pub begin: u32,
    pub end: u32,
}

impl std::fmt::Display for InvalidKeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid key range: begin {:#010x} is greater than end {:#010x}",
            self.begin, self.end
        )
    }
}

impl std::error::Error for InvalidKeyRange {}

impl KeyRange {
    /// The entire hash space.
    pub const FULL: Self = Self {
        begin: 0,
        end: u32::MAX,
    };

    /// # Errors
    ///
    /// Returns [`InvalidKeyRange`] if `begin > end`.
    pub fn new(begin: u32, end: u32) -> Result<Self, InvalidKeyRange> {
        if begin > end {
            return Err(InvalidKeyRange { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// Whether the two ranges share at least one key.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.end >= other.begin && self.begin <= other.end
    }

    /// Whether `self` fully contains `other`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.begin <= other.begin && self.end >= other.end
    }

    /// `end - begin`; narrower covering ranges are preferred on claim.
    #[must_use]
    pub fn span(&self) -> u32 {
        self.end - self.begin
    }
}

impl std::fmt::Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:08x}, {:08x}]", self.begin, self.end)
    }
}

/// A checkpoint-table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fence {
    pub materialization: MaterializationName,
    pub range: KeyRange,
    /// Current epoch. Bumped by every claim overlapping `range`.
    pub fence: i64,
    /// Opaque resumption state.
    pub checkpoint: Vec<u8>,
}
