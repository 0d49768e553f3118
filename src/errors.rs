//! Domain error taxonomy
//!
//! Handlers surface failures as `anyhow::Error`; the variants here are the
//! ones the scheduler or tests need to tell apart, recovered by downcast.
//! Everything else stays a plain contextual error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// A deployed contract moved to a major version this build does not
    /// track. Processing under the old decoder would corrupt the read model.
    #[error("contract {contract}: on-chain major version {onchain} does not match tracked {tracked}")]
    ContractMajorMismatch {
        contract: String,
        onchain: u32,
        tracked: u32,
    },

    /// A sub-account recycle arrived before the grace period elapsed. The
    /// chain enforces the grace period, so this indicates a logic or
    /// contract-version mismatch, not a retryable condition.
    #[error("sub-account {account} recycled before grace period: expired_at={expired_at} now={now}")]
    RecycleBeforeGrace {
        account: String,
        expired_at: u64,
        now: u64,
    },

    /// A recognized witness payload failed to decode.
    #[error("witness decode: {0}")]
    Decode(String),

    /// A decoder expected exactly one cell of a kind and found zero or many.
    #[error("expected exactly one {kind} cell, found {found}")]
    ExactlyOne { kind: &'static str, found: usize },
}

impl IndexError {
    /// Shorthand for a [`IndexError::Decode`] wrapped in `anyhow::Error`.
    pub fn decode(msg: impl Into<String>) -> anyhow::Error {
        anyhow::Error::new(IndexError::Decode(msg.into()))
    }
}

/// True if the error chain contains a fatal contract-version mismatch.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::ContractMajorMismatch { .. })
    )
}
