use thiserror::Error;

use taskchat_shared::{ConversationId, LocalId};

/// Errors produced by the store layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An entry with the same local id is already pending.
    #[error("Speculative message {0} already exists")]
    DuplicateLocalId(LocalId),

    /// The entry was built for another conversation than the store's.
    #[error("Speculative message belongs to {got}, store is scoped to {expected}")]
    ConversationMismatch {
        expected: ConversationId,
        got: ConversationId,
    },

    /// Only pending entries may be stored.
    #[error("Speculative message {0} is not pending")]
    NotPending(LocalId),

    /// Unrecognised reconciliation mode name.
    #[error("Unknown reconciliation mode: {0}")]
    UnknownReconcileMode(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
