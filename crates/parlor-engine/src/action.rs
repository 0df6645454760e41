//! Tagged inbound actions.
//!
//! Every interactive event reaches the engine as an [`Action`]: a command
//! already parsed and authorized by the chat layer, or a button press whose
//! payload is the serialized action itself. The engine answers the acting
//! user with a [`Reply`].

use parlor_core::{Content, SessionId, UserId};
use parlor_games::{GameKind, Move};
use parlor_ledger::ChanceOutcome;
use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::session::SessionStatus;
use crate::tod::PromptKind;

fn staked_by_default() -> bool {
    true
}

/// An event from a user, addressed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Action {
    /// Challenge another member to a game.
    Challenge {
        /// The challenged user.
        opponent: UserId,
        /// Whether both players must stake. Unstaked games settle nothing.
        #[serde(default = "staked_by_default")]
        staked: bool,
    },
    /// Pick the game to play.
    SelectGame {
        /// Target session.
        session: SessionId,
        /// Chosen game.
        game: GameKind,
    },
    /// Pick the best-of round count for dice.
    SetRounds {
        /// Target session.
        session: SessionId,
        /// Round count.
        rounds: u8,
    },
    /// Stake points.
    StakePoints {
        /// Target session.
        session: SessionId,
        /// Points to stake.
        amount: i64,
    },
    /// Stake a media artifact.
    StakeMedia {
        /// Target session.
        session: SessionId,
        /// The attachment.
        content: Content,
    },
    /// Confirm the staged setup and send the challenge.
    ConfirmSetup {
        /// Target session.
        session: SessionId,
    },
    /// Clear the staged setup and start over.
    RestartSetup {
        /// Target session.
        session: SessionId,
    },
    /// Withdraw the challenge before it is sent.
    AbortSetup {
        /// Target session.
        session: SessionId,
    },
    /// Accept or refuse a challenge.
    Respond {
        /// Target session.
        session: SessionId,
        /// `true` to accept.
        accept: bool,
    },
    /// Make a move.
    Play {
        /// Target session.
        session: SessionId,
        /// The move.
        play: Move,
    },
    /// Roll a die, letting the engine pick the value.
    RollDie {
        /// Target session.
        session: SessionId,
    },
    /// Challenge the winner of a finished session to a rematch.
    Revenge {
        /// The finished session.
        session: SessionId,
    },
    /// Ask for a truth or a dare.
    TruthOrDare {
        /// Which pool to draw from.
        kind: PromptKind,
    },
    /// Accept or refuse a truth-or-dare prompt.
    TodRespond {
        /// Target session.
        session: SessionId,
        /// `true` to accept.
        accept: bool,
    },
    /// A plain message from the user, checked as truth-or-dare proof.
    Submit {
        /// The message.
        content: Content,
    },
    /// Admin: stop the group's running session.
    StopGame,
    /// Admin: declare a player the loser of the group's running session.
    DeclareLoser {
        /// The losing player.
        user: UserId,
    },
    /// Admin: credit points.
    AddPoints {
        /// Recipient.
        user: UserId,
        /// Positive amount.
        amount: i64,
    },
    /// Admin: debit points.
    RemovePoints {
        /// Target.
        user: UserId,
        /// Positive amount.
        amount: i64,
    },
    /// Show a balance; the actor's own if no user is given.
    Balance {
        /// Whose balance.
        #[serde(default)]
        user: Option<UserId>,
    },
    /// Show the group leaderboard.
    Leaderboard,
    /// Spin the chance wheel.
    Spin,
    /// Admin: drop every completed session record.
    PurgeCompleted,
    /// Admin: list a user's media stakes.
    StakeAudit {
        /// Whose stakes.
        user: UserId,
    },
}

impl Action {
    /// Whether only group admins may perform this action.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Action::StopGame
                | Action::DeclareLoser { .. }
                | Action::AddPoints { .. }
                | Action::RemovePoints { .. }
                | Action::PurgeCompleted
                | Action::StakeAudit { .. }
        )
    }

    /// Encode as a compact button payload.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a button payload.
    pub fn from_payload(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// The engine's answer to the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reply")]
pub enum Reply {
    /// A session was opened.
    Opened {
        /// The new session.
        session: SessionId,
    },
    /// A session moved to a new status.
    Updated {
        /// The session.
        session: SessionId,
        /// Its status now.
        status: SessionStatus,
    },
    /// A truth-or-dare session changed.
    Tod {
        /// The session; gone once resolved.
        session: SessionId,
        /// Whether the session still exists.
        open: bool,
    },
    /// Proof was accepted and points awarded.
    ProofAccepted {
        /// Points awarded.
        reward: i64,
    },
    /// A balance.
    Balance {
        /// Account holder.
        user: UserId,
        /// Current balance.
        balance: i64,
    },
    /// Top balances in the group.
    Leaderboard {
        /// (user, balance), highest first.
        rows: Vec<(UserId, i64)>,
    },
    /// The chance wheel stopped.
    Spun {
        /// What came up.
        outcome: ChanceOutcome,
        /// Spins left today.
        remaining: u8,
    },
    /// Completed sessions removed.
    Purged {
        /// How many.
        count: usize,
    },
    /// Media stakes on record.
    Audit {
        /// Entries, oldest first.
        entries: Vec<AuditEntry>,
    },
    /// The message was not addressed to anything.
    Ignored,
}
