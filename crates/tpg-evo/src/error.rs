//! Harness-level errors.
//!
//! Wraps [`tpg_core::TpgError`] and adds the one distinction the core
//! crate doesn't need to make: whether a failure is ordinary (this
//! generation's mutation/evaluation attempt failed, try the next one) or
//! fatal (the graph's own consistency broke and survived a cleanup pass -
//! nothing downstream can be trusted, so the generational loop must stop).

use thiserror::Error;
use tpg_core::TpgError;

/// Errors produced by the evolutionary harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A `HarnessConfig` probability/count was out of range.
    #[error("invalid harness configuration: {reason}")]
    InvalidConfig { reason: String },

    /// An ordinary core-graph error surfaced during a generation (e.g. a
    /// mutation operator hit a configuration problem). Not fatal - the
    /// caller can skip this generation's mutation and retry.
    #[error(transparent)]
    Core(#[from] TpgError),

    /// The post-GC verifier found mismatches that survived cleanup. Per
    /// `spec.md` §7 this is terminal for the harness.
    #[error("graph inconsistency survived garbage collection; halting: {reason}")]
    Fatal { reason: String },
}

impl HarnessError {
    /// Whether the generational loop must stop, as opposed to skipping
    /// this generation and continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Fatal { .. })
    }
}
