//! Error types for the session engine.

use parlor_core::{CoreError, GroupId, SessionId};
use parlor_games::GameError;
use parlor_ledger::LedgerError;

use crate::session::SessionStatus;
use crate::store::StoreError;
use crate::tod::PromptKind;

/// Broad classes of failure, used by the command layer to decide how to
/// report an error to the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; state is unchanged and the user may try again.
    Validation,
    /// The session no longer exists or is already resolved.
    NotFound,
    /// The actor may not do this now.
    Forbidden,
    /// Persistence failed; the operation was abandoned.
    Store,
}

/// Errors that can occur while handling an event.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A core value failed validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A move was rejected by the game rules.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A store could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session id is unknown.
    #[error("session {0} is no longer valid")]
    SessionNotFound(SessionId),

    /// The session has already completed.
    #[error("session {0} is no longer active")]
    NoLongerActive(SessionId),

    /// The group already has a session in progress.
    #[error("group {0} already has a game in progress")]
    GroupBusy(GroupId),

    /// The user already has an unresolved truth-or-dare in the group.
    #[error("you already have an open truth or dare in this group")]
    TodAlreadyOpen,

    /// The actor is not a player in this session.
    #[error("you are not part of this game")]
    NotParticipant,

    /// The actor lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// The action does not apply in the session's current status.
    #[error("cannot {action} while the session is {status}")]
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// Where the session stands.
        status: SessionStatus,
    },

    /// Submitted proof does not match the prompt kind.
    #[error("that does not count as proof for a {required}: {}", .required.proof_hint())]
    InvalidProof {
        /// The prompt kind awaiting proof.
        required: PromptKind,
    },

    /// Any other invalid input.
    #[error("{0}")]
    Validation(String),

    /// A scheduler action no longer applies after re-checking under the lock.
    #[error("scheduler action for {0} is stale")]
    Stale(SessionId),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Game(GameError::NotYourTurn)
            | EngineError::NotParticipant
            | EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::SessionNotFound(_)
            | EngineError::NoLongerActive(_)
            | EngineError::Stale(_) => ErrorKind::NotFound,
            EngineError::Store(_) => ErrorKind::Store,
            EngineError::Core(_)
            | EngineError::Game(_)
            | EngineError::Ledger(_)
            | EngineError::GroupBusy(_)
            | EngineError::TodAlreadyOpen
            | EngineError::InvalidState { .. }
            | EngineError::InvalidProof { .. }
            | EngineError::Validation(_)
            | EngineError::Config(_) => ErrorKind::Validation,
        }
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(EngineError::Game(GameError::NotYourTurn).kind(), ErrorKind::Forbidden);
        assert_eq!(EngineError::Game(GameError::CellTaken(3)).kind(), ErrorKind::Validation);
        assert_eq!(EngineError::SessionNotFound(SessionId::new()).kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::Core(CoreError::NonPositiveStake(0)).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn proof_error_names_required_kind() {
        let msg = EngineError::InvalidProof {
            required: PromptKind::Dare,
        }
        .to_string();
        assert!(msg.contains("dare"));
        assert!(msg.contains("photo or video"));
    }
}
