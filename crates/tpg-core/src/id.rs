//! Stable ID newtypes for graph entities.
//!
//! `ProgramId` and `TeamId` are distinct newtype wrappers over a monotonically
//! increasing `u64`, so a `ProgramId` can never be accidentally used where a
//! `TeamId` is expected. Both are minted once by the owning graph's counters
//! and are never reused, even after the entity they named is garbage
//! collected.

use std::fmt;

/// Stable program (bidder) identifier. Rendered as `P<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

/// Stable team identifier. Rendered as `T<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub u64);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
