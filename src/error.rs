use thiserror::Error;

/// The allocator's error taxonomy. Kinds, not a single opaque error: callers
/// branch on these (the tracker/replication layer above this crate retries
/// `NoSpace` against another node, but never retries `BadName`).
#[derive(Debug, Error)]
pub enum TrunkError {
    #[error("no storage path has sufficient free space")]
    NoSpace,

    #[error("requested size exceeds the largest slot class")]
    NoSlot,

    #[error("no matching extent found")]
    NotFound,

    #[error("filename too short for its encoded flags")]
    BadName,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, TrunkError>;
