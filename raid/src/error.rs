//! Control-plane error taxonomy and the data-plane status enum.
//!
//! Control-plane operations return [`RaidError`] through an ordinary
//! `Result`; data-plane sub-I/O completions roll into [`IoStatus`] instead —
//! mixing the two would let a retryable per-leg failure masquerade as a
//! fatal control-plane error. Grounded on `hal::storage::IoErr` /
//! `hal::gpt::GPTErr` (derive `thiserror::Error`, `no_std`-compatible via
//! the `thiserror-core` fork).

use thiserror::Error;

pub const MAX_NAME_SIZE: usize = 64;

/// A RAID device or base-device name, bounded the way the on-disk
/// superblock bounds it.
pub type Name = heapless::String<MAX_NAME_SIZE>;

pub fn name_from_str(s: &str) -> Result<Name, RaidError> {
    let mut n = Name::new();
    n.push_str(s)
        .map_err(|_| RaidError::InvalidArgument("name exceeds MAX_NAME_SIZE"))?;
    Ok(n)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaidError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("already exists: {0}")]
    AlreadyExists(&'static str),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("busy: {0}")]
    Busy(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    #[error("corrupt: {0}")]
    Corrupt(&'static str),
    #[error("state violation: {0}")]
    StateViolation(&'static str),
}

pub type RaidResult<T> = Result<T, RaidError>;

/// Rolled-up status of a per-I/O context. Unlike [`RaidError`] this is
/// data-plane only: one copy lives inline in every in-flight request and
/// is downgraded, never escalated, as sub-I/Os complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    Success,
    Failed,
    /// `-ENOMEM` at submission time: retryable via the base device's wait
    /// queue, never surfaced as a final front-end completion status.
    NoMem,
}
