//! Outbound notifications and their delivery.
//!
//! Transitions produce [`Notice`] values. The [`Dispatcher`] resolves member
//! names, renders the text, and sends it to each audience. Delivery failures
//! are logged and swallowed; they never abort the operation that produced
//! the notice.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_core::{Chat, GroupId, MessageRef, SessionId, Stake, UserId};
use parlor_games::{GameKind, ShipKind};
use parlor_ledger::ChanceOutcome;
use tracing::{debug, warn};

use crate::action::Action;
use crate::messenger::{Button, Messenger};
use crate::session::CancelReason;
use crate::settlement::Trophy;
use crate::tod::PromptKind;

/// Who a notice goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The group chat.
    Group,
    /// A private message to one user.
    User(UserId),
    /// A private message to every group admin.
    Admins,
}

/// A notification produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A challenge was issued; the challenger picks a game.
    ChallengeIssued {
        /// Session.
        session: SessionId,
        /// Challenger.
        challenger: UserId,
        /// Opponent.
        opponent: UserId,
        /// Whether this is a rematch.
        revenge: bool,
    },
    /// Dice needs a round count.
    RoundsPrompt {
        /// Session.
        session: SessionId,
        /// Challenger.
        challenger: UserId,
        /// Allowed counts.
        options: Vec<u8>,
    },
    /// A player must submit a stake.
    StakePrompt {
        /// Session.
        session: SessionId,
        /// Who must stake.
        user: UserId,
    },
    /// The challenger's setup is complete and awaits confirmation.
    SetupReady {
        /// Session.
        session: SessionId,
        /// Challenger.
        challenger: UserId,
        /// Chosen game.
        game: GameKind,
        /// Dice rounds, if any.
        rounds: Option<u8>,
        /// Challenger's stake, if staked.
        stake: Option<Stake>,
    },
    /// The challenge is put to the opponent.
    ChallengeOffered {
        /// Session.
        session: SessionId,
        /// Challenger.
        challenger: UserId,
        /// Opponent.
        opponent: UserId,
        /// Chosen game.
        game: GameKind,
        /// Challenger's stake.
        stake: Option<Stake>,
    },
    /// The opponent accepted and must now stake.
    ChallengeAccepted {
        /// Session.
        session: SessionId,
        /// Opponent.
        opponent: UserId,
    },
    /// The opponent refused.
    ChallengeRefused {
        /// Session.
        session: SessionId,
        /// Challenger.
        challenger: UserId,
        /// Opponent.
        opponent: UserId,
        /// Whether this was a rematch.
        revenge: bool,
    },
    /// Play has begun.
    GameStarted {
        /// Session.
        session: SessionId,
        /// Game.
        game: GameKind,
        /// Challenger.
        challenger: UserId,
        /// Opponent.
        opponent: UserId,
        /// Rendered board.
        board: String,
        /// Move buttons.
        buttons: Vec<Button>,
    },
    /// A move was played.
    MovePlayed {
        /// Session.
        session: SessionId,
        /// Mover.
        actor: UserId,
        /// What happened.
        summary: String,
        /// Rendered board.
        board: String,
        /// Who moves next, if one player holds the turn.
        next: Option<UserId>,
        /// Move buttons.
        buttons: Vec<Button>,
    },
    /// A player's private fleet view during placement.
    FleetStatus {
        /// Session.
        session: SessionId,
        /// Fleet owner.
        user: UserId,
        /// Rendered own grid.
        grid: String,
        /// Next ship to place.
        next: Option<ShipKind>,
    },
    /// The game ended with a winner.
    GameWon {
        /// Session.
        session: SessionId,
        /// Game.
        game: Option<GameKind>,
        /// Winner.
        winner: UserId,
        /// Loser.
        loser: UserId,
        /// Whether an admin decided it.
        declared: bool,
    },
    /// The game ended level.
    GameDrawn {
        /// Session.
        session: SessionId,
        /// Game.
        game: GameKind,
    },
    /// The session was cancelled.
    SessionCancelled {
        /// Session.
        session: SessionId,
        /// Why.
        reason: CancelReason,
        /// Whether stakes were forfeited.
        forfeit: bool,
    },
    /// Idle players are warned once.
    InactivityWarning {
        /// Session.
        session: SessionId,
        /// Players to nudge.
        users: Vec<UserId>,
        /// Seconds until cancellation.
        remaining_secs: i64,
    },
    /// Ledger changes from settlement.
    Settled {
        /// Session.
        session: SessionId,
        /// Per-user deltas.
        deltas: Vec<(UserId, i64)>,
    },
    /// A punishment threshold was crossed.
    PunishmentFired {
        /// Punished user.
        user: UserId,
        /// Rule text.
        message: String,
        /// Rule threshold.
        threshold: i64,
        /// Balance that crossed it.
        balance: i64,
    },
    /// A user was muted for going negative.
    Muted {
        /// Muted user.
        user: UserId,
        /// Strike number.
        strike: u8,
        /// Mute end.
        until: DateTime<Utc>,
    },
    /// A user reached the strike limit.
    StrikeLimit {
        /// User.
        user: UserId,
        /// Balance left in place.
        balance: i64,
    },
    /// A truth-or-dare prompt awaits acceptance.
    TodPrompt {
        /// Session.
        session: SessionId,
        /// Subject.
        user: UserId,
        /// Truth or dare.
        kind: PromptKind,
        /// Prompt text.
        prompt: String,
    },
    /// A prompt was refused.
    TodRefused {
        /// Subject.
        user: UserId,
        /// Truth or dare.
        kind: PromptKind,
        /// Refused prompt.
        prompt: String,
    },
    /// Proof is overdue soon.
    TodWarning {
        /// Subject.
        user: UserId,
        /// Truth or dare.
        kind: PromptKind,
        /// Seconds left.
        remaining_secs: i64,
    },
    /// Proof never arrived.
    TodTimedOut {
        /// Subject.
        user: UserId,
        /// Truth or dare.
        kind: PromptKind,
        /// Prompt text.
        prompt: String,
        /// Points deducted.
        penalty: i64,
    },
    /// Proof was accepted.
    TodCompleted {
        /// Subject.
        user: UserId,
        /// Truth or dare.
        kind: PromptKind,
        /// Points awarded.
        reward: i64,
    },
    /// An admin adjusted a balance.
    PointsAdjusted {
        /// Account holder.
        user: UserId,
        /// Change.
        delta: i64,
        /// New balance.
        balance: i64,
    },
    /// The chance wheel stopped.
    ChanceSpun {
        /// Player.
        user: UserId,
        /// Result.
        outcome: ChanceOutcome,
    },
}

impl Notice {
    /// Audiences this notice is sent to.
    pub fn audiences(&self) -> Vec<Audience> {
        match self {
            Notice::FleetStatus { user, .. } => vec![Audience::User(*user)],
            Notice::TodRefused { .. } => vec![Audience::Admins],
            Notice::PunishmentFired { .. }
            | Notice::StrikeLimit { .. }
            | Notice::TodTimedOut { .. } => vec![Audience::Group, Audience::Admins],
            Notice::ChanceSpun { outcome, .. } if outcome.needs_admin() => {
                vec![Audience::Group, Audience::Admins]
            }
            _ => vec![Audience::Group],
        }
    }

    /// Users named in the text.
    pub fn mentions(&self) -> Vec<UserId> {
        match self {
            Notice::ChallengeIssued {
                challenger,
                opponent,
                ..
            }
            | Notice::ChallengeOffered {
                challenger,
                opponent,
                ..
            }
            | Notice::ChallengeRefused {
                challenger,
                opponent,
                ..
            }
            | Notice::GameStarted {
                challenger,
                opponent,
                ..
            } => vec![*challenger, *opponent],
            Notice::GameWon { winner, loser, .. } => vec![*winner, *loser],
            Notice::MovePlayed { actor, next, .. } => {
                std::iter::once(*actor).chain(*next).collect()
            }
            Notice::RoundsPrompt { challenger, .. } | Notice::SetupReady { challenger, .. } => {
                vec![*challenger]
            }
            Notice::StakePrompt { user, .. }
            | Notice::FleetStatus { user, .. }
            | Notice::PunishmentFired { user, .. }
            | Notice::Muted { user, .. }
            | Notice::StrikeLimit { user, .. }
            | Notice::TodPrompt { user, .. }
            | Notice::TodRefused { user, .. }
            | Notice::TodWarning { user, .. }
            | Notice::TodTimedOut { user, .. }
            | Notice::TodCompleted { user, .. }
            | Notice::PointsAdjusted { user, .. }
            | Notice::ChanceSpun { user, .. } => vec![*user],
            Notice::ChallengeAccepted { opponent, .. } => vec![*opponent],
            Notice::InactivityWarning { users, .. } => users.clone(),
            Notice::Settled { deltas, .. } => deltas.iter().map(|(u, _)| *u).collect(),
            Notice::GameDrawn { .. } | Notice::SessionCancelled { .. } => Vec::new(),
        }
    }

    /// Inline buttons attached to the notice.
    pub fn buttons(&self) -> Vec<Button> {
        match self {
            Notice::ChallengeIssued { session, .. } => GameKind::ALL
                .iter()
                .map(|&game| {
                    Button::new(
                        capitalize(&game.to_string()),
                        Action::SelectGame {
                            session: *session,
                            game,
                        },
                    )
                })
                .collect(),
            Notice::RoundsPrompt {
                session, options, ..
            } => options
                .iter()
                .map(|&rounds| {
                    Button::new(
                        format!("Best of {rounds}"),
                        Action::SetRounds {
                            session: *session,
                            rounds,
                        },
                    )
                })
                .collect(),
            Notice::SetupReady { session, .. } => vec![
                Button::new("Confirm", Action::ConfirmSetup { session: *session }),
                Button::new("Restart", Action::RestartSetup { session: *session }),
                Button::new("Abort", Action::AbortSetup { session: *session }),
            ],
            Notice::ChallengeOffered { session, .. } => respond_buttons(|accept| Action::Respond {
                session: *session,
                accept,
            }),
            Notice::TodPrompt { session, .. } => respond_buttons(|accept| Action::TodRespond {
                session: *session,
                accept,
            }),
            Notice::GameStarted { buttons, .. } | Notice::MovePlayed { buttons, .. } => {
                buttons.clone()
            }
            _ => Vec::new(),
        }
    }

    /// Render the text, naming users through `name`.
    pub fn render(&self, name: &dyn Fn(UserId) -> String) -> String {
        match self {
            Notice::ChallengeIssued {
                challenger,
                opponent,
                revenge,
                ..
            } => {
                let verb = if *revenge { "wants revenge on" } else { "challenges" };
                format!(
                    "{} {verb} {}! {}, pick a game.",
                    name(*challenger),
                    name(*opponent),
                    name(*challenger)
                )
            }
            Notice::RoundsPrompt { challenger, .. } => {
                format!("{}, how many rounds?", name(*challenger))
            }
            Notice::StakePrompt { user, .. } => format!(
                "{}, send your stake: a number of points, or a photo, video or voice message.",
                name(*user)
            ),
            Notice::SetupReady {
                challenger,
                game,
                rounds,
                stake,
                ..
            } => {
                let mut text = format!("{}, ready to play {game}", name(*challenger));
                if let Some(r) = rounds {
                    text.push_str(&format!(" (best of {r})"));
                }
                if let Some(s) = stake {
                    text.push_str(&format!(" for {s}"));
                }
                text.push('?');
                text
            }
            Notice::ChallengeOffered {
                challenger,
                opponent,
                game,
                stake,
                ..
            } => match stake {
                Some(s) => format!(
                    "{}, {} challenges you to {game} and stakes {s}. Accept?",
                    name(*opponent),
                    name(*challenger)
                ),
                None => format!(
                    "{}, {} challenges you to a friendly game of {game}. Accept?",
                    name(*opponent),
                    name(*challenger)
                ),
            },
            Notice::ChallengeAccepted { opponent, .. } => {
                format!("{} accepted the challenge.", name(*opponent))
            }
            Notice::ChallengeRefused {
                challenger,
                opponent,
                revenge,
                ..
            } => {
                if *revenge {
                    format!(
                        "{} refused the rematch and concedes to {}.",
                        name(*opponent),
                        name(*challenger)
                    )
                } else {
                    format!(
                        "{} refused. {} forfeits the stake.",
                        name(*opponent),
                        name(*challenger)
                    )
                }
            }
            Notice::GameStarted {
                game,
                challenger,
                opponent,
                board,
                ..
            } => format!(
                "{game}: {} vs {}. {} moves first.\n{board}",
                name(*challenger),
                name(*opponent),
                name(*challenger)
            ),
            Notice::MovePlayed {
                actor,
                summary,
                board,
                next,
                ..
            } => {
                let mut text = format!("{} {summary}\n{board}", name(*actor));
                if let Some(n) = next {
                    text.push_str(&format!("\n{} to move.", name(*n)));
                }
                text
            }
            Notice::FleetStatus { grid, next, .. } => match next {
                Some(ship) => format!("{grid}\nPlace your {ship}, e.g. A1 H or A1 V."),
                None => format!("{grid}\nFleet placed."),
            },
            Notice::GameWon {
                game,
                winner,
                loser,
                declared,
                ..
            } => {
                let game = game.map(|g| format!(" at {g}")).unwrap_or_default();
                if *declared {
                    format!(
                        "An admin declared {} the loser. {} wins{game}!",
                        name(*loser),
                        name(*winner)
                    )
                } else {
                    format!("{} beats {}{game}!", name(*winner), name(*loser))
                }
            }
            Notice::GameDrawn { game, .. } => {
                format!("The {game} game is a draw. Both players lose their stakes.")
            }
            Notice::SessionCancelled {
                reason, forfeit, ..
            } => {
                let tail = if *forfeit {
                    " Both players forfeit their stakes."
                } else {
                    ""
                };
                format!("Game cancelled: {reason}.{tail}")
            }
            Notice::InactivityWarning {
                users,
                remaining_secs,
                ..
            } => {
                let who: Vec<String> = users.iter().map(|u| name(*u)).collect();
                format!(
                    "{}: no activity for a while. The game is cancelled in {} unless someone moves.",
                    who.join(", "),
                    minutes(*remaining_secs)
                )
            }
            Notice::Settled { deltas, .. } => deltas
                .iter()
                .map(|(u, d)| format!("{}: {d:+} points", name(*u)))
                .collect::<Vec<_>>()
                .join("\n"),
            Notice::PunishmentFired {
                user,
                message,
                threshold,
                balance,
            } => format!(
                "{} fell below {threshold} points ({balance}). Punishment: {message}",
                name(*user)
            ),
            Notice::Muted {
                user,
                strike,
                until,
            } => format!(
                "{} went negative (strike {strike}) and is muted until {}. Balance reset to 0.",
                name(*user),
                until.format("%Y-%m-%d %H:%M UTC")
            ),
            Notice::StrikeLimit { user, balance } => format!(
                "{} went negative again ({balance} points). Strike limit reached; the admins will decide.",
                name(*user)
            ),
            Notice::TodPrompt {
                user, kind, prompt, ..
            } => format!("{}, your {kind}: {prompt}", name(*user)),
            Notice::TodRefused { user, kind, prompt } => {
                format!("{} refused the {kind}: {prompt}", name(*user))
            }
            Notice::TodWarning {
                user,
                kind,
                remaining_secs,
            } => format!(
                "{}, your {kind} proof is due in {}. {}.",
                name(*user),
                minutes(*remaining_secs),
                capitalize(kind.proof_hint())
            ),
            Notice::TodTimedOut {
                user,
                kind,
                prompt,
                penalty,
            } => format!(
                "{} did not complete the {kind} \"{prompt}\" in time and loses {penalty} points.",
                name(*user)
            ),
            Notice::TodCompleted { user, kind, reward } => {
                format!("{} completed the {kind} and earns {reward} points.", name(*user))
            }
            Notice::PointsAdjusted {
                user,
                delta,
                balance,
            } => format!(
                "{}: {delta:+} points, balance {balance}.",
                name(*user)
            ),
            Notice::ChanceSpun { user, outcome } => {
                format!("{} spins the wheel: {outcome}!", name(*user))
            }
        }
    }
}

fn respond_buttons(make: impl Fn(bool) -> Action) -> Vec<Button> {
    vec![Button::new("Accept", make(true)), Button::new("Refuse", make(false))]
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn minutes(secs: i64) -> String {
    let m = (secs + 59) / 60;
    if m == 1 {
        "1 minute".to_string()
    } else {
        format!("{m} minutes")
    }
}

/// Sends notices through a [`Messenger`], swallowing failures.
#[derive(Clone)]
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    /// Wrap a messenger.
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// The wrapped messenger.
    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    async fn names(&self, group: GroupId, users: Vec<UserId>) -> HashMap<UserId, String> {
        let mut names = HashMap::new();
        for user in users {
            if names.contains_key(&user) {
                continue;
            }
            let name = match self.messenger.member_name(group, user).await {
                Ok(name) => name,
                Err(e) => {
                    debug!(%group, %user, error = %e, "member lookup failed");
                    format!("user {user}")
                }
            };
            names.insert(user, name);
        }
        names
    }

    /// Group admins; empty if the lookup fails.
    pub async fn admins(&self, group: GroupId) -> Vec<UserId> {
        match self.messenger.chat_admins(group).await {
            Ok(admins) => admins,
            Err(e) => {
                warn!(%group, error = %e, "admin lookup failed");
                Vec::new()
            }
        }
    }

    /// Deliver one notice to all of its audiences. Returns the references of
    /// messages that were actually sent.
    pub async fn deliver(&self, group: GroupId, notice: &Notice) -> Vec<MessageRef> {
        let names = self.names(group, notice.mentions()).await;
        let text = notice.render(&|u| names.get(&u).cloned().unwrap_or_else(|| format!("user {u}")));
        let buttons = notice.buttons();
        let mut chats = Vec::new();
        for audience in notice.audiences() {
            match audience {
                Audience::Group => chats.push(Chat::Group(group)),
                Audience::User(u) => chats.push(Chat::Private(u)),
                Audience::Admins => {
                    chats.extend(self.admins(group).await.into_iter().map(Chat::Private))
                }
            }
        }
        let mut sent = Vec::new();
        for chat in chats {
            match self.messenger.send_message(chat, &text, &buttons).await {
                Ok(r) => sent.push(r),
                Err(e) => warn!(%group, %chat, error = %e, "notice delivery failed"),
            }
        }
        sent
    }

    /// Deliver several notices in order.
    pub async fn deliver_all(&self, group: GroupId, notices: &[Notice]) -> Vec<MessageRef> {
        let mut sent = Vec::new();
        for notice in notices {
            sent.extend(self.deliver(group, notice).await);
        }
        sent
    }

    /// Edit a message, ignoring failures.
    pub async fn edit(&self, message: MessageRef, text: &str) {
        if let Err(e) = self.messenger.edit_message(message, text).await {
            warn!(%message, error = %e, "edit failed");
        }
    }

    /// Delete messages, ignoring failures.
    pub async fn delete_all(&self, messages: &[MessageRef]) {
        for &message in messages {
            if let Err(e) = self.messenger.delete_message(message).await {
                warn!(%message, error = %e, "delete failed");
            }
        }
    }

    /// Post a forfeited media stake to the group.
    pub async fn expose(&self, group: GroupId, trophy: &Trophy) {
        let names = self.names(group, vec![trophy.owner]).await;
        let owner = names
            .get(&trophy.owner)
            .cloned()
            .unwrap_or_else(|| format!("user {}", trophy.owner));
        let caption = format!("Forfeited by {owner}");
        if let Err(e) = self
            .messenger
            .send_media(Chat::Group(group), trophy.kind, &trophy.reference, &caption)
            .await
        {
            warn!(%group, owner = %trophy.owner, error = %e, "trophy post failed");
        }
    }

    /// Mute a member, ignoring failures.
    pub async fn restrict(&self, group: GroupId, user: UserId, until: DateTime<Utc>) {
        if let Err(e) = self.messenger.restrict_member(group, user, until).await {
            warn!(%group, %user, error = %e, "mute failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use parlor_core::MediaKind;

    use super::*;
    use crate::messenger::{RecordingMessenger, Sent};

    const G: GroupId = GroupId(-1);

    fn dispatcher(m: RecordingMessenger) -> (Dispatcher, Arc<RecordingMessenger>) {
        let m = Arc::new(m);
        (Dispatcher::new(m.clone()), m)
    }

    #[test]
    fn render_uses_names() {
        let n = Notice::ChallengeIssued {
            session: SessionId::new(),
            challenger: UserId(1),
            opponent: UserId(2),
            revenge: false,
        };
        let text = n.render(&|u| if u == UserId(1) { "Ann".into() } else { "Bo".into() });
        assert_eq!(text, "Ann challenges Bo! Ann, pick a game.");
        assert_eq!(n.buttons().len(), 4);
    }

    #[test]
    fn warning_counts_minutes() {
        let n = Notice::InactivityWarning {
            session: SessionId::new(),
            users: vec![UserId(1)],
            remaining_secs: 120,
        };
        assert!(n.render(&|_| "Ann".into()).contains("2 minutes"));
    }

    #[tokio::test]
    async fn admins_receive_private_copies() {
        let (d, m) = dispatcher(
            RecordingMessenger::new()
                .with_admins(G, [UserId(10), UserId(11)])
                .with_name(UserId(5), "Eve"),
        );
        let sent = d
            .deliver(
                G,
                &Notice::StrikeLimit {
                    user: UserId(5),
                    balance: -3,
                },
            )
            .await;
        assert_eq!(sent.len(), 3);
        assert_eq!(m.texts_to(Chat::Private(UserId(11))).await.len(), 1);
        assert!(m.texts_to(Chat::Group(G)).await[0].starts_with("Eve went negative"));
    }

    #[tokio::test]
    async fn blocked_admin_does_not_stop_delivery() {
        let (d, m) = dispatcher(
            RecordingMessenger::new()
                .with_admins(G, [UserId(10), UserId(11)])
                .with_blocked(UserId(10)),
        );
        let notice = Notice::TodRefused {
            user: UserId(5),
            kind: PromptKind::Truth,
            prompt: "secrets".into(),
        };
        let sent = d.deliver(G, &notice).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(m.texts_to(Chat::Private(UserId(11))).await.len(), 1);
        assert!(m.texts_to(Chat::Group(G)).await.is_empty());
    }

    #[tokio::test]
    async fn delete_failures_are_swallowed() {
        let (d, m) = dispatcher(RecordingMessenger::new().with_failing_deletes());
        let msg = m.send_message(Chat::Group(G), "x", &[]).await.unwrap();
        d.delete_all(&[msg]).await;
        assert!(!m.sent().await.iter().any(|s| matches!(s, Sent::Delete { .. })));
    }

    #[tokio::test]
    async fn trophy_is_posted_as_media() {
        let (d, m) = dispatcher(RecordingMessenger::new());
        d.expose(
            G,
            &Trophy {
                owner: UserId(3),
                kind: MediaKind::Voice,
                reference: "v-1".into(),
            },
        )
        .await;
        assert!(matches!(
            &m.sent().await[..],
            [Sent::Media { kind: MediaKind::Voice, caption, .. }] if caption == "Forfeited by user 3"
        ));
    }
}
