//! Error types for the points economy.

use parlor_core::{GroupId, UserId};

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A punishment with this message already exists in the group.
    #[error("a punishment with message \"{0}\" already exists")]
    DuplicatePunishment(String),

    /// No punishment with this message exists in the group.
    #[error("no punishment with message \"{0}\"")]
    UnknownPunishment(String),

    /// The user has used all chance plays for today.
    #[error("user {user} in group {group} has no chance plays left today")]
    NoPlaysLeft {
        /// Group the play was attempted in.
        group: GroupId,
        /// User who attempted it.
        user: UserId,
    },

    /// An administrative adjustment must be a positive amount.
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}

/// Convenience result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
