//! Two-player session lifecycle.
//!
//! A [`Session`] is advanced by [`Session::step`], a pure function from the
//! current record and one [`SessionEvent`] to the next record plus the
//! notices it produces. The engine persists the returned record under the
//! store lock and performs all I/O afterwards.
//!
//! ```text
//! pending_game_selection ──confirm──▶ pending_opponent_acceptance
//!        │   (friendly)                     │ accept          │ refuse
//!        └──────────────▶ active ◀──stake── pending_opponent_stake
//!                            │                                ▼
//!                            └──── win / draw / stop ────▶ complete
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use parlor_core::{GroupId, MessageRef, SessionId, Stake, UserId};
use parlor_games::{Board, GameKind, Move, Outcome, Report, Seat};
use parlor_games::dice::{ROUND_OPTIONS, RollEffect};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::messenger::Button;
use crate::notice::Notice;
use crate::store::Record;

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The challenger is choosing the game, rounds, and stake.
    PendingGameSelection,
    /// The opponent has not yet answered.
    PendingOpponentAcceptance,
    /// The opponent accepted and must stake.
    PendingOpponentStake,
    /// Moves are being played.
    Active,
    /// Resolved. Terminal.
    Complete,
}

impl SessionStatus {
    /// Whether the transition table allows `self -> next`.
    pub fn can_become(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Complete, _) => false,
            (_, Complete) => true,
            (PendingGameSelection, PendingOpponentAcceptance | Active) => true,
            (PendingOpponentAcceptance, PendingOpponentStake) => true,
            (PendingOpponentStake, Active) => true,
            _ => false,
        }
    }

    /// Whether this is the terminal state.
    pub fn is_complete(self) -> bool {
        self == SessionStatus::Complete
    }

    /// Whether the opponent has accepted. Cancellation forfeits stakes only
    /// from here on.
    pub fn accepted(self) -> bool {
        matches!(
            self,
            SessionStatus::PendingOpponentStake | SessionStatus::Active
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::PendingGameSelection => "waiting for game selection",
            SessionStatus::PendingOpponentAcceptance => "waiting for the opponent to accept",
            SessionStatus::PendingOpponentStake => "waiting for the opponent's stake",
            SessionStatus::Active => "active",
            SessionStatus::Complete => "complete",
        })
    }
}

/// Stakes staged per seat. Nothing touches the ledger until settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakes {
    /// The challenger's stake.
    pub challenger: Option<Stake>,
    /// The opponent's stake.
    pub opponent: Option<Stake>,
}

impl Stakes {
    /// The stake staged for `seat`.
    pub fn of(&self, seat: Seat) -> Option<&Stake> {
        match seat {
            Seat::Challenger => self.challenger.as_ref(),
            Seat::Opponent => self.opponent.as_ref(),
        }
    }

    fn set(&mut self, seat: Seat, stake: Stake) {
        match seat {
            Seat::Challenger => self.challenger = Some(stake),
            Seat::Opponent => self.opponent = Some(stake),
        }
    }
}

/// Why a session was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// An admin stopped it.
    AdminStop,
    /// Nobody moved for too long.
    Timeout,
    /// The opponent never answered.
    AcceptanceExpired,
    /// The challenger withdrew during setup.
    Aborted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CancelReason::AdminStop => "stopped by an admin",
            CancelReason::Timeout => "no activity",
            CancelReason::AcceptanceExpired => "the challenge was not answered",
            CancelReason::Aborted => "withdrawn by the challenger",
        })
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "resolution")]
pub enum Resolution {
    /// A player won.
    Won {
        /// Winner.
        winner: UserId,
        /// Loser.
        loser: UserId,
    },
    /// Nobody won.
    Draw,
    /// The opponent refused the challenge.
    Refused {
        /// Who refused.
        by: UserId,
    },
    /// Ended early.
    Cancelled {
        /// Why.
        reason: CancelReason,
        /// Whether both stakes are forfeited.
        forfeit: bool,
    },
}

/// Back-reference from a rematch to the session it avenges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevengeLink {
    /// The finished session.
    pub session: SessionId,
    /// The original winner's stake, conceded if they refuse the rematch.
    pub conceded: Option<Stake>,
}

/// A two-player session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity.
    pub id: SessionId,
    /// Group the session runs in.
    pub group: GroupId,
    /// Issuer; always moves first.
    pub challenger: UserId,
    /// Challenged user.
    pub opponent: UserId,
    /// Selected game.
    pub game: Option<GameKind>,
    /// Dice round count.
    pub rounds: Option<u8>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Whether stakes are required.
    pub staked: bool,
    /// Staged stakes.
    pub stakes: Stakes,
    /// Game state, once the game is fully chosen.
    pub board: Option<Board>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last user-driven change.
    pub last_activity: DateTime<Utc>,
    /// Whether the inactivity warning went out.
    pub warning_sent: bool,
    /// Messages to delete when the session completes.
    #[serde(default)]
    pub tracked_messages: Vec<MessageRef>,
    /// Set for rematches.
    #[serde(default)]
    pub revenge_of: Option<RevengeLink>,
    /// Set once complete.
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for Session {
    type Key = SessionId;

    fn key(&self) -> SessionId {
        self.id
    }
}

/// An input to [`Session::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Challenger picks the game.
    SelectGame {
        /// Actor.
        actor: UserId,
        /// Game.
        game: GameKind,
    },
    /// Challenger picks the dice round count.
    SetRounds {
        /// Actor.
        actor: UserId,
        /// Round count.
        rounds: u8,
    },
    /// A player stakes. The stake is already validated against the balance.
    Stake {
        /// Actor.
        actor: UserId,
        /// Stake.
        stake: Stake,
    },
    /// Challenger sends the challenge.
    Confirm {
        /// Actor.
        actor: UserId,
    },
    /// Challenger clears the setup.
    Restart {
        /// Actor.
        actor: UserId,
    },
    /// Challenger withdraws.
    Abort {
        /// Actor.
        actor: UserId,
    },
    /// Opponent answers.
    Respond {
        /// Actor.
        actor: UserId,
        /// Accept?
        accept: bool,
    },
    /// A player moves.
    Move {
        /// Actor.
        actor: UserId,
        /// The move.
        play: Move,
    },
    /// Admin names the loser.
    DeclareLoser {
        /// Loser.
        loser: UserId,
    },
    /// Admin stops the session.
    Stop,
    /// Scheduler: penalized inactivity cancellation.
    Timeout,
    /// Scheduler: the opponent never answered.
    ExpireAcceptance,
    /// Scheduler: one-time inactivity warning.
    Warn,
}

impl SessionEvent {
    fn label(&self) -> &'static str {
        match self {
            SessionEvent::SelectGame { .. } => "select a game",
            SessionEvent::SetRounds { .. } => "set rounds",
            SessionEvent::Stake { .. } => "stake",
            SessionEvent::Confirm { .. } => "confirm the setup",
            SessionEvent::Restart { .. } => "restart the setup",
            SessionEvent::Abort { .. } => "abort the setup",
            SessionEvent::Respond { .. } => "answer the challenge",
            SessionEvent::Move { .. } => "move",
            SessionEvent::DeclareLoser { .. } => "declare a loser",
            SessionEvent::Stop => "stop the game",
            SessionEvent::Timeout => "time out",
            SessionEvent::ExpireAcceptance => "expire the challenge",
            SessionEvent::Warn => "warn",
        }
    }

    fn is_scheduled(&self) -> bool {
        matches!(
            self,
            SessionEvent::Timeout | SessionEvent::ExpireAcceptance | SessionEvent::Warn
        )
    }
}

/// Inputs a step may consult besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Current time.
    pub now: DateTime<Utc>,
    /// Engine settings.
    pub config: &'a EngineConfig,
}

/// Result of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The record to persist.
    pub session: Session,
    /// Notices to deliver once the record is persisted.
    pub notices: Vec<Notice>,
    /// Whether this step completed the session.
    pub completed: bool,
}

impl Session {
    /// Open a challenge.
    pub fn new(
        group: GroupId,
        challenger: UserId,
        opponent: UserId,
        staked: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        if challenger == opponent {
            return Err(EngineError::Validation("you cannot challenge yourself".into()));
        }
        Ok(Self {
            id: SessionId::new(),
            group,
            challenger,
            opponent,
            game: None,
            rounds: None,
            status: SessionStatus::PendingGameSelection,
            staked,
            stakes: Stakes::default(),
            board: None,
            created_at: now,
            last_activity: now,
            warning_sent: false,
            tracked_messages: Vec::new(),
            revenge_of: None,
            resolution: None,
            completed_at: None,
        })
    }

    /// Open a rematch of `old` with roles swapped. Only the loser of a
    /// decided session may ask.
    pub fn revenge(old: &Session, actor: UserId, now: DateTime<Utc>) -> EngineResult<Self> {
        let Some(Resolution::Won { winner, loser }) = old.resolution.clone() else {
            return Err(EngineError::Validation(
                "only a game with a winner can be avenged".into(),
            ));
        };
        if actor != loser {
            return Err(EngineError::Forbidden(
                "only the loser can ask for revenge".into(),
            ));
        }
        let conceded = old
            .seat_of(winner)
            .and_then(|seat| old.stakes.of(seat).cloned());
        let mut session = Session::new(old.group, loser, winner, old.staked, now)?;
        session.revenge_of = Some(RevengeLink {
            session: old.id,
            conceded,
        });
        Ok(session)
    }

    /// The seat `user` plays in, if any.
    pub fn seat_of(&self, user: UserId) -> Option<Seat> {
        if user == self.challenger {
            Some(Seat::Challenger)
        } else if user == self.opponent {
            Some(Seat::Opponent)
        } else {
            None
        }
    }

    /// The user in `seat`.
    pub fn user_at(&self, seat: Seat) -> UserId {
        match seat {
            Seat::Challenger => self.challenger,
            Seat::Opponent => self.opponent,
        }
    }

    /// Both players.
    pub fn players(&self) -> [UserId; 2] {
        [self.challenger, self.opponent]
    }

    /// Time since the last user-driven change.
    pub fn idle(&self, now: DateTime<Utc>) -> chrono::TimeDelta {
        now - self.last_activity
    }

    /// The prompt that opens this session in the group.
    pub fn opening_notice(&self) -> Notice {
        Notice::ChallengeIssued {
            session: self.id,
            challenger: self.challenger,
            opponent: self.opponent,
            revenge: self.revenge_of.is_some(),
        }
    }

    /// Apply `event`. On error the caller keeps the record unchanged.
    pub fn step(&self, event: SessionEvent, ctx: &StepContext<'_>) -> EngineResult<Step> {
        if self.status.is_complete() {
            return Err(EngineError::NoLongerActive(self.id));
        }
        let mut next = self.clone();
        if !event.is_scheduled() {
            next.last_activity = ctx.now;
            next.warning_sent = false;
        }
        let mut notices = Vec::new();
        let label = event.label();

        match event {
            SessionEvent::SelectGame { actor, game } => {
                next.ensure_setup(actor, label)?;
                next.game = Some(game);
                next.rounds = None;
                next.board = None;
                if game == GameKind::Dice {
                    notices.push(Notice::RoundsPrompt {
                        session: next.id,
                        challenger: next.challenger,
                        options: ctx.config.dice_rounds.clone(),
                    });
                } else {
                    next.board = Some(Board::new(game, None)?);
                    next.after_game_chosen(&mut notices)?;
                }
            }
            SessionEvent::SetRounds { actor, rounds } => {
                next.ensure_setup(actor, label)?;
                if next.game != Some(GameKind::Dice) {
                    return Err(EngineError::Validation(
                        "rounds only apply to dice".into(),
                    ));
                }
                if !ctx.config.dice_rounds.contains(&rounds) || !ROUND_OPTIONS.contains(&rounds) {
                    return Err(EngineError::Validation(format!(
                        "choose one of {:?} rounds",
                        ctx.config.dice_rounds
                    )));
                }
                next.rounds = Some(rounds);
                next.board = Some(Board::new(GameKind::Dice, Some(rounds))?);
                next.after_game_chosen(&mut notices)?;
            }
            SessionEvent::Stake { actor, stake } => {
                let seat = next.seat_of(actor).ok_or(EngineError::NotParticipant)?;
                if !next.staked {
                    return Err(EngineError::Validation("this is a friendly game".into()));
                }
                match (next.status, seat) {
                    (SessionStatus::PendingGameSelection, Seat::Challenger) => {
                        if next.board.is_none() {
                            return Err(EngineError::Validation(
                                "choose the game before staking".into(),
                            ));
                        }
                        next.stakes.set(seat, stake);
                        notices.push(next.setup_ready()?);
                    }
                    (SessionStatus::PendingOpponentStake, Seat::Opponent) => {
                        next.stakes.set(seat, stake);
                        next.advance(SessionStatus::Active, label)?;
                        notices.push(next.game_started()?);
                    }
                    (status, _) => return Err(EngineError::InvalidState { action: label, status }),
                }
            }
            SessionEvent::Confirm { actor } => {
                next.ensure_setup(actor, label)?;
                if next.board.is_none() {
                    return Err(EngineError::Validation("choose the game first".into()));
                }
                if next.stakes.challenger.is_none() {
                    return Err(EngineError::Validation("submit your stake first".into()));
                }
                next.advance(SessionStatus::PendingOpponentAcceptance, label)?;
                notices.push(Notice::ChallengeOffered {
                    session: next.id,
                    challenger: next.challenger,
                    opponent: next.opponent,
                    game: next.board_kind()?,
                    stake: next.stakes.challenger.clone(),
                });
            }
            SessionEvent::Restart { actor } => {
                next.ensure_setup(actor, label)?;
                next.game = None;
                next.rounds = None;
                next.board = None;
                next.stakes = Stakes::default();
                notices.push(next.opening_notice());
            }
            SessionEvent::Abort { actor } => {
                next.ensure_setup(actor, label)?;
                next.complete(
                    Resolution::Cancelled {
                        reason: CancelReason::Aborted,
                        forfeit: false,
                    },
                    ctx.now,
                );
                notices.push(Notice::SessionCancelled {
                    session: next.id,
                    reason: CancelReason::Aborted,
                    forfeit: false,
                });
            }
            SessionEvent::Respond { actor, accept } => {
                next.seat_of(actor).ok_or(EngineError::NotParticipant)?;
                if next.status != SessionStatus::PendingOpponentAcceptance {
                    return Err(EngineError::InvalidState {
                        action: label,
                        status: next.status,
                    });
                }
                if actor != next.opponent {
                    return Err(EngineError::Forbidden(
                        "only the challenged player can answer".into(),
                    ));
                }
                if accept {
                    next.advance(SessionStatus::PendingOpponentStake, label)?;
                    notices.push(Notice::ChallengeAccepted {
                        session: next.id,
                        opponent: next.opponent,
                    });
                    notices.push(Notice::StakePrompt {
                        session: next.id,
                        user: next.opponent,
                    });
                } else {
                    next.complete(Resolution::Refused { by: actor }, ctx.now);
                    notices.push(Notice::ChallengeRefused {
                        session: next.id,
                        challenger: next.challenger,
                        opponent: next.opponent,
                        revenge: next.revenge_of.is_some(),
                    });
                }
            }
            SessionEvent::Move { actor, play } => {
                let seat = next.seat_of(actor).ok_or(EngineError::NotParticipant)?;
                if next.status != SessionStatus::Active {
                    return Err(EngineError::InvalidState {
                        action: label,
                        status: next.status,
                    });
                }
                next.play(seat, &play, ctx.now, &mut notices)?;
            }
            SessionEvent::DeclareLoser { loser } => {
                let seat = next.seat_of(loser).ok_or(EngineError::NotParticipant)?;
                if next.status != SessionStatus::Active {
                    return Err(EngineError::InvalidState {
                        action: label,
                        status: next.status,
                    });
                }
                let winner = next.user_at(seat.other());
                next.complete(Resolution::Won { winner, loser }, ctx.now);
                notices.push(Notice::GameWon {
                    session: next.id,
                    game: next.game,
                    winner,
                    loser,
                    declared: true,
                });
            }
            SessionEvent::Stop => {
                let forfeit = next.status.accepted();
                next.cancel(CancelReason::AdminStop, forfeit, ctx.now, &mut notices);
            }
            SessionEvent::Timeout => {
                if next.status == SessionStatus::PendingOpponentAcceptance
                    || next.idle(ctx.now) <= ctx.config.timeout_after()
                {
                    return Err(EngineError::Stale(next.id));
                }
                let forfeit = next.status.accepted();
                next.cancel(CancelReason::Timeout, forfeit, ctx.now, &mut notices);
            }
            SessionEvent::ExpireAcceptance => {
                if next.status != SessionStatus::PendingOpponentAcceptance
                    || next.idle(ctx.now) <= ctx.config.acceptance_grace()
                {
                    return Err(EngineError::Stale(next.id));
                }
                next.cancel(CancelReason::AcceptanceExpired, false, ctx.now, &mut notices);
            }
            SessionEvent::Warn => {
                if next.warning_sent
                    || next.status == SessionStatus::PendingOpponentAcceptance
                    || next.idle(ctx.now) <= ctx.config.warning_after()
                {
                    return Err(EngineError::Stale(next.id));
                }
                next.warning_sent = true;
                notices.push(Notice::InactivityWarning {
                    session: next.id,
                    users: next.players().to_vec(),
                    remaining_secs: ctx.config.warning_lead().num_seconds(),
                });
            }
        }

        let completed = next.status.is_complete();
        Ok(Step {
            session: next,
            notices,
            completed,
        })
    }

    fn ensure_setup(&self, actor: UserId, action: &'static str) -> EngineResult<()> {
        self.seat_of(actor).ok_or(EngineError::NotParticipant)?;
        if self.status != SessionStatus::PendingGameSelection {
            return Err(EngineError::InvalidState {
                action,
                status: self.status,
            });
        }
        if actor != self.challenger {
            return Err(EngineError::Forbidden(
                "only the challenger can set up the game".into(),
            ));
        }
        Ok(())
    }

    fn advance(&mut self, next: SessionStatus, action: &'static str) -> EngineResult<()> {
        if !self.status.can_become(next) {
            return Err(EngineError::InvalidState {
                action,
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    fn complete(&mut self, resolution: Resolution, now: DateTime<Utc>) {
        self.status = SessionStatus::Complete;
        self.resolution = Some(resolution);
        self.completed_at = Some(now);
    }

    fn cancel(
        &mut self,
        reason: CancelReason,
        forfeit: bool,
        now: DateTime<Utc>,
        notices: &mut Vec<Notice>,
    ) {
        self.complete(Resolution::Cancelled { reason, forfeit }, now);
        notices.push(Notice::SessionCancelled {
            session: self.id,
            reason,
            forfeit,
        });
    }

    fn board_kind(&self) -> EngineResult<GameKind> {
        self.board
            .as_ref()
            .map(Board::kind)
            .ok_or_else(|| EngineError::Validation("no game selected".into()))
    }

    /// Game and rounds are settled: friendly games start, staked games ask
    /// the challenger for a stake.
    fn after_game_chosen(&mut self, notices: &mut Vec<Notice>) -> EngineResult<()> {
        if self.staked {
            notices.push(Notice::StakePrompt {
                session: self.id,
                user: self.challenger,
            });
        } else {
            self.advance(SessionStatus::Active, "start the game")?;
            notices.push(self.game_started()?);
        }
        Ok(())
    }

    fn setup_ready(&self) -> EngineResult<Notice> {
        Ok(Notice::SetupReady {
            session: self.id,
            challenger: self.challenger,
            game: self.board_kind()?,
            rounds: self.rounds,
            stake: self.stakes.challenger.clone(),
        })
    }

    fn game_started(&self) -> EngineResult<Notice> {
        let board = self
            .board
            .as_ref()
            .ok_or_else(|| EngineError::Validation("no game selected".into()))?;
        Ok(Notice::GameStarted {
            session: self.id,
            game: board.kind(),
            challenger: self.challenger,
            opponent: self.opponent,
            board: board.render(),
            buttons: self.move_buttons(),
        })
    }

    fn play(
        &mut self,
        seat: Seat,
        play: &Move,
        now: DateTime<Utc>,
        notices: &mut Vec<Notice>,
    ) -> EngineResult<()> {
        let id = self.id;
        let players = self.players();
        let actor = players[seat.index()];
        let board = self
            .board
            .as_mut()
            .ok_or_else(|| EngineError::Validation("no game selected".into()))?;
        let progress = board.apply(seat, play)?;
        let board: &Board = board;
        let next = board.turn().map(|s| players[s.index()]);
        let rendered = board.render();

        if let (Board::Battleship(game), Report::Placed(placement)) = (board, &progress.report) {
            notices.push(Notice::FleetStatus {
                session: id,
                user: actor,
                grid: game.render_own(seat),
                next: placement.next,
            });
            if placement.battle_ready {
                notices.push(Notice::MovePlayed {
                    session: id,
                    actor,
                    summary: "placed the last ship. Both fleets are ready.".into(),
                    board: rendered,
                    next,
                    buttons: Vec::new(),
                });
            }
        } else {
            let buttons = if progress.outcome.is_none() {
                self.move_buttons()
            } else {
                Vec::new()
            };
            notices.push(Notice::MovePlayed {
                session: id,
                actor,
                summary: describe(&progress.report),
                board: rendered,
                next,
                buttons,
            });
        }

        match progress.outcome {
            Some(Outcome::Win(seat)) => {
                let winner = players[seat.index()];
                let loser = players[seat.other().index()];
                self.complete(Resolution::Won { winner, loser }, now);
                notices.push(Notice::GameWon {
                    session: id,
                    game: self.game,
                    winner,
                    loser,
                    declared: false,
                });
            }
            Some(Outcome::Draw) => {
                let game = self.board_kind()?;
                self.complete(Resolution::Draw, now);
                notices.push(Notice::GameDrawn { session: id, game });
            }
            None => {}
        }
        Ok(())
    }

    /// Inline buttons for the next move.
    pub fn move_buttons(&self) -> Vec<Button> {
        let session = self.id;
        match &self.board {
            Some(Board::Dice(m)) if m.outcome().is_none() => {
                vec![Button::new("Roll", Action::RollDie { session })]
            }
            Some(Board::ConnectFour(g)) if g.outcome().is_none() => {
                (0..parlor_games::connect_four::COLS)
                    .filter(|&col| g.cell(0, col).is_none())
                    .map(|column| {
                        Button::new(
                            (column + 1).to_string(),
                            Action::Play {
                                session,
                                play: Move::Drop { column },
                            },
                        )
                    })
                    .collect()
            }
            Some(Board::TicTacToe(g)) if g.outcome().is_none() => (0..9)
                .filter(|&cell| g.cell(cell).is_none())
                .map(|cell| {
                    Button::new(
                        (cell + 1).to_string(),
                        Action::Play {
                            session,
                            play: Move::Mark { cell },
                        },
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn describe(report: &Report) -> String {
    match report {
        Report::Rolled { value, effect } => match effect {
            RollEffect::Waiting => format!("rolled {value}."),
            RollEffect::Round(round) => {
                let result = match round.winner {
                    Some(seat) => format!("round to the {seat}"),
                    None => "tie, roll again".to_string(),
                };
                format!(
                    "rolled {value}. {} vs {}: {result}.",
                    round.challenger, round.opponent
                )
            }
        },
        Report::Dropped { column, .. } => format!("dropped into column {}.", column + 1),
        Report::Marked { cell } => format!("marked cell {}.", cell + 1),
        Report::Placed(placement) => format!("placed the {}.", placement.ship),
        Report::Fired(shot) => match (shot.hit, shot.sunk) {
            (true, Some(ship)) => format!("fired at {}: hit and sunk the {ship}!", shot.target),
            (true, None) => format!("fired at {}: hit.", shot.target),
            (false, _) => format!("fired at {}: miss.", shot.target),
        },
    }
}

#[cfg(test)]
mod tests {
    use parlor_games::{Coord, Orientation};

    use super::*;

    const G: GroupId = GroupId(-100);
    const ANN: UserId = UserId(1);
    const BO: UserId = UserId(2);

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    fn go(session: &Session, event: SessionEvent, config: &EngineConfig) -> EngineResult<Step> {
        session.step(
            event,
            &StepContext {
                now: t0(),
                config,
            },
        )
    }

    fn run(session: Session, events: Vec<SessionEvent>) -> Step {
        let config = EngineConfig::default();
        let mut step = Step {
            session,
            notices: Vec::new(),
            completed: false,
        };
        for event in events {
            step = go(&step.session, event, &config).unwrap();
        }
        step
    }

    fn staked_active(game: GameKind) -> Session {
        let mut events = vec![SessionEvent::SelectGame { actor: ANN, game }];
        if game == GameKind::Dice {
            events.push(SessionEvent::SetRounds {
                actor: ANN,
                rounds: 3,
            });
        }
        events.extend([
            SessionEvent::Stake {
                actor: ANN,
                stake: Stake::Points { amount: 10 },
            },
            SessionEvent::Confirm { actor: ANN },
            SessionEvent::Respond {
                actor: BO,
                accept: true,
            },
            SessionEvent::Stake {
                actor: BO,
                stake: Stake::Points { amount: 20 },
            },
        ]);
        run(Session::new(G, ANN, BO, true, t0()).unwrap(), events).session
    }

    fn roll(actor: UserId, value: u8) -> SessionEvent {
        SessionEvent::Move {
            actor,
            play: Move::Roll { value },
        }
    }

    #[test]
    fn transition_table() {
        use SessionStatus::*;
        assert!(PendingGameSelection.can_become(Active));
        assert!(PendingGameSelection.can_become(PendingOpponentAcceptance));
        assert!(!PendingGameSelection.can_become(PendingOpponentStake));
        assert!(Active.can_become(Complete));
        assert!(!Complete.can_become(Complete));
        assert!(!Active.can_become(PendingOpponentAcceptance));
    }

    #[test]
    fn staked_setup_reaches_active() {
        let s = staked_active(GameKind::TicTacToe);
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.stakes.opponent, Some(Stake::Points { amount: 20 }));
    }

    #[test]
    fn cannot_challenge_self() {
        assert!(Session::new(G, ANN, ANN, true, t0()).is_err());
    }

    #[test]
    fn friendly_game_skips_acceptance() {
        let s = Session::new(G, ANN, BO, false, t0()).unwrap();
        let step = run(
            s,
            vec![SessionEvent::SelectGame {
                actor: ANN,
                game: GameKind::ConnectFour,
            }],
        );
        assert_eq!(step.session.status, SessionStatus::Active);
        assert!(matches!(&step.notices[..], [Notice::GameStarted { .. }]));
    }

    #[test]
    fn dice_needs_rounds_before_stake() {
        let config = EngineConfig::default();
        let s = run(
            Session::new(G, ANN, BO, true, t0()).unwrap(),
            vec![SessionEvent::SelectGame {
                actor: ANN,
                game: GameKind::Dice,
            }],
        )
        .session;
        let err = go(
            &s,
            SessionEvent::Stake {
                actor: ANN,
                stake: Stake::Points { amount: 5 },
            },
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        let err = go(
            &s,
            SessionEvent::SetRounds {
                actor: ANN,
                rounds: 4,
            },
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[3, 5, 9]"));
    }

    #[test]
    fn only_challenger_sets_up() {
        let s = Session::new(G, ANN, BO, true, t0()).unwrap();
        let err = go(
            &s,
            SessionEvent::SelectGame {
                actor: BO,
                game: GameKind::Dice,
            },
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        let err = go(
            &s,
            SessionEvent::SelectGame {
                actor: UserId(9),
                game: GameKind::Dice,
            },
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotParticipant));
    }

    #[test]
    fn restart_clears_setup() {
        let s = run(
            Session::new(G, ANN, BO, true, t0()).unwrap(),
            vec![
                SessionEvent::SelectGame {
                    actor: ANN,
                    game: GameKind::TicTacToe,
                },
                SessionEvent::Stake {
                    actor: ANN,
                    stake: Stake::Points { amount: 5 },
                },
                SessionEvent::Restart { actor: ANN },
            ],
        )
        .session;
        assert_eq!(s.game, None);
        assert_eq!(s.board, None);
        assert_eq!(s.stakes, Stakes::default());
        assert_eq!(s.status, SessionStatus::PendingGameSelection);
    }

    #[test]
    fn refusal_completes_without_play() {
        let step = run(
            Session::new(G, ANN, BO, true, t0()).unwrap(),
            vec![
                SessionEvent::SelectGame {
                    actor: ANN,
                    game: GameKind::TicTacToe,
                },
                SessionEvent::Stake {
                    actor: ANN,
                    stake: Stake::Points { amount: 5 },
                },
                SessionEvent::Confirm { actor: ANN },
                SessionEvent::Respond {
                    actor: BO,
                    accept: false,
                },
            ],
        );
        assert!(step.completed);
        assert_eq!(step.session.resolution, Some(Resolution::Refused { by: BO }));
    }

    #[test]
    fn dice_best_of_three() {
        let step = run(
            staked_active(GameKind::Dice),
            vec![
                roll(ANN, 4),
                roll(BO, 2),
                roll(ANN, 1),
                roll(BO, 5),
                roll(BO, 3),
                roll(ANN, 6),
            ],
        );
        assert!(step.completed);
        assert_eq!(
            step.session.resolution,
            Some(Resolution::Won {
                winner: ANN,
                loser: BO
            })
        );
    }

    #[test]
    fn off_turn_move_changes_nothing() {
        let s = staked_active(GameKind::ConnectFour);
        let err = go(
            &s,
            SessionEvent::Move {
                actor: BO,
                play: Move::Drop { column: 3 },
            },
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Forbidden);
    }

    #[test]
    fn complete_is_inert() {
        let s = staked_active(GameKind::TicTacToe);
        let done = go(&s, SessionEvent::Stop, &EngineConfig::default()).unwrap();
        assert_eq!(
            done.session.resolution,
            Some(Resolution::Cancelled {
                reason: CancelReason::AdminStop,
                forfeit: true
            })
        );
        let again = go(&done.session, SessionEvent::Stop, &EngineConfig::default());
        assert!(matches!(again, Err(EngineError::NoLongerActive(_))));
    }

    #[test]
    fn stop_before_acceptance_forfeits_nothing() {
        let s = Session::new(G, ANN, BO, true, t0()).unwrap();
        let done = go(&s, SessionEvent::Stop, &EngineConfig::default()).unwrap();
        assert_eq!(
            done.session.resolution,
            Some(Resolution::Cancelled {
                reason: CancelReason::AdminStop,
                forfeit: false
            })
        );
    }

    #[test]
    fn scheduler_events_recheck_idle_time() {
        let config = EngineConfig::default();
        let s = staked_active(GameKind::TicTacToe);
        let early = StepContext {
            now: t0() + config.warning_after(),
            config: &config,
        };
        assert!(matches!(
            s.step(SessionEvent::Warn, &early),
            Err(EngineError::Stale(_))
        ));
        let late = StepContext {
            now: t0() + config.warning_after() + chrono::TimeDelta::seconds(1),
            config: &config,
        };
        let warned = s.step(SessionEvent::Warn, &late).unwrap().session;
        assert!(warned.warning_sent);
        assert_eq!(warned.last_activity, s.last_activity);
        assert!(matches!(
            warned.step(SessionEvent::Warn, &late),
            Err(EngineError::Stale(_))
        ));
        let moved = warned
            .step(
                SessionEvent::Move {
                    actor: ANN,
                    play: Move::Mark { cell: 4 },
                },
                &late,
            )
            .unwrap()
            .session;
        assert!(!moved.warning_sent);
    }

    #[test]
    fn battleship_placement_reports_privately() {
        let s = staked_active(GameKind::Battleship);
        let step = go(
            &s,
            SessionEvent::Move {
                actor: BO,
                play: Move::Place {
                    origin: Coord { col: 0, row: 0 },
                    orientation: Orientation::Horizontal,
                },
            },
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            &step.notices[..],
            [Notice::FleetStatus { user, next: Some(_), .. }] if *user == BO
        ));
    }

    #[test]
    fn revenge_swaps_roles() {
        let config = EngineConfig::default();
        let s = staked_active(GameKind::TicTacToe);
        let done = go(&s, SessionEvent::DeclareLoser { loser: ANN }, &config)
            .unwrap()
            .session;
        assert!(Session::revenge(&done, BO, t0()).is_err());
        let rematch = Session::revenge(&done, ANN, t0()).unwrap();
        assert_eq!(rematch.challenger, ANN);
        assert_eq!(rematch.opponent, BO);
        let link = rematch.revenge_of.unwrap();
        assert_eq!(link.session, done.id);
        assert_eq!(link.conceded, Some(Stake::Points { amount: 20 }));
    }

    #[test]
    fn move_buttons_follow_free_cells() {
        let s = staked_active(GameKind::TicTacToe);
        assert_eq!(s.move_buttons().len(), 9);
        let s = go(
            &s,
            SessionEvent::Move {
                actor: ANN,
                play: Move::Mark { cell: 0 },
            },
            &EngineConfig::default(),
        )
        .unwrap()
        .session;
        assert_eq!(s.move_buttons().len(), 8);
    }
}
