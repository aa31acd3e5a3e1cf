//! Queue engine error types with stable numeric codes.
//!
//! [`QueueError`] is the central error type of the crate. Missing or
//! malformed stored records are deliberately *not* represented here: the
//! engine recovers from them by rebuilding the seed snapshot. Only genuine
//! storage failures and invalid configuration surface as errors.

/// Crate-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              |
/// |-----------|-----------------------|
/// | 1000–1999 | Configuration         |
/// | 2000–2999 | Queue state           |
/// | 3000–3999 | Storage / serialization |
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot failed structural validation (duplicate ids or positions,
    /// more than one current user).
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The record store backend failed (lock poisoned, unreadable backing map).
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem failure in a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded to JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::InvalidSnapshot(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Store(_) => 3001,
            Self::Io(_) => 3002,
            Self::Serialization(_) => 3003,
        }
    }

    /// Returns `true` if the failure originated in the storage layer.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io(_) | Self::Serialization(_))
    }
}
