/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while validating core values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A point stake must be strictly positive.
    #[error("stake must be a positive amount, got {0}")]
    NonPositiveStake(i64),

    /// The submitter does not have enough points to cover the stake.
    #[error("insufficient points: staking {needed} but only {available} available")]
    InsufficientFunds {
        /// The amount the user tried to stake.
        needed: i64,
        /// The user's current balance.
        available: i64,
    },

    /// The content cannot be used as a media stake.
    #[error("{0} cannot be staked; send a photo, video, or voice message")]
    NotStakeable(crate::content::ContentKind),

    /// A media reference was empty.
    #[error("media reference is empty")]
    EmptyReference,

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
