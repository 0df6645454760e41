//! The session engine.
//!
//! [`Engine::handle`] routes an [`Action`] from an already-authenticated
//! user. Every handler follows the same discipline: enter one store's
//! critical section, load, apply a pure transition, persist, leave, and only
//! then talk to the [`Messenger`]. No store lock is held across chat I/O.
//!
//! A session is persisted as complete before any ledger delta from its
//! settlement is applied, so a crash in between loses the deltas rather than
//! applying them twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_core::{Content, GroupId, MessageRef, SessionId, Stake, UserId};
use parlor_games::{Move, dice};
use parlor_ledger::{ChanceBook, DeltaReport, LedgerEffect, LedgerError, PointsLedger};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::action::{Action, Reply};
use crate::audit::{AuditEntry, StakeAudit};
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, Settings};
use crate::error::{EngineError, EngineResult};
use crate::messenger::Messenger;
use crate::notice::{Dispatcher, Notice, capitalize};
use crate::scheduler::{self, GameSweep, TodSweep};
use crate::session::{CancelReason, Resolution, Session, SessionEvent, Step, StepContext};
use crate::settlement::settle;
use crate::store::{JsonFileBackend, Store, StoreError, Table};
use crate::tod::{PromptKind, TodSession, TodStatus, pick_prompt};

/// File names used by a data directory.
const SESSIONS_FILE: &str = "sessions.json";
const TOD_FILE: &str = "tod.json";
const LEDGER_FILE: &str = "ledger.json";
const CHANCE_FILE: &str = "chance.json";
const AUDIT_FILE: &str = "audit.json";

struct Stores {
    games: Store<Table<Session>>,
    tods: Store<Table<TodSession>>,
    ledger: Store<PointsLedger>,
    chance: Store<ChanceBook>,
    audit: Store<StakeAudit>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            games: Store::in_memory("sessions"),
            tods: Store::in_memory("tod"),
            ledger: Store::in_memory("ledger"),
            chance: Store::in_memory("chance"),
            audit: Store::in_memory("audit"),
        }
    }

    fn open(dir: &Path) -> EngineResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            store: "data".into(),
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            games: Store::open("sessions", JsonFileBackend::new(dir.join(SESSIONS_FILE)))?,
            tods: Store::open("tod", JsonFileBackend::new(dir.join(TOD_FILE)))?,
            ledger: Store::open("ledger", JsonFileBackend::new(dir.join(LEDGER_FILE)))?,
            chance: Store::open("chance", JsonFileBackend::new(dir.join(CHANCE_FILE)))?,
            audit: Store::open("audit", JsonFileBackend::new(dir.join(AUDIT_FILE)))?,
        })
    }
}

struct Inner {
    config: EngineConfig,
    settings: Settings,
    stores: Stores,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    messenger: Arc<dyn Messenger>,
    config: EngineConfig,
    settings: Settings,
    clock: Arc<dyn Clock>,
    data_dir: Option<PathBuf>,
}

impl EngineBuilder {
    /// Start a builder around the chat platform.
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self {
            messenger,
            config: EngineConfig::default(),
            settings: Settings::default(),
            clock: Arc::new(SystemClock),
            data_dir: None,
        }
    }

    /// Use `config`.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use per-group `settings`.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Read time from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist every store as JSON under `dir`. Without this, state lives in
    /// memory only.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Validate the configuration and open the stores.
    pub fn build(self) -> EngineResult<Engine> {
        self.config.validate()?;
        let stores = match &self.data_dir {
            Some(dir) => Stores::open(dir)?,
            None => Stores::in_memory(),
        };
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Engine {
            inner: Arc::new(Inner {
                config: self.config,
                settings: self.settings,
                stores,
                dispatcher: Dispatcher::new(self.messenger),
                clock: self.clock,
                rng: Mutex::new(rng),
            }),
        })
    }
}

/// Handle to the session engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Snapshot of every two-player session.
    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.stores.games.lock().await.list().cloned().collect()
    }

    /// One two-player session, if it still exists.
    pub async fn session(&self, id: SessionId) -> Option<Session> {
        self.inner.stores.games.lock().await.get(&id).cloned()
    }

    /// The group's session that is not yet complete, if any.
    pub async fn active_session(&self, group: GroupId) -> Option<Session> {
        self.inner
            .stores
            .games
            .lock()
            .await
            .find(|s| s.group == group && !s.status.is_complete())
            .cloned()
    }

    /// Snapshot of every open truth-or-dare session.
    pub async fn tod_sessions(&self) -> Vec<TodSession> {
        self.inner.stores.tods.lock().await.list().cloned().collect()
    }

    /// Current balance.
    pub async fn balance(&self, group: GroupId, user: UserId) -> i64 {
        self.inner.stores.ledger.lock().await.balance(group, user)
    }

    /// Every account with a balance in `group`, as (user, balance).
    pub async fn balances(&self, group: GroupId) -> Vec<(UserId, i64)> {
        self.inner
            .stores
            .ledger
            .lock()
            .await
            .accounts_in(group)
            .into_iter()
            .map(|a| (a.user, a.balance))
            .collect()
    }

    /// Route one action from `actor` in `group`.
    pub async fn handle(&self, actor: UserId, group: GroupId, action: Action) -> EngineResult<Reply> {
        if action.requires_admin() && !self.is_admin(group, actor).await {
            return Err(EngineError::Forbidden("only group admins can do that".into()));
        }
        debug!(%group, %actor, ?action, "handling action");
        match action {
            Action::Challenge { opponent, staked } => {
                let session = Session::new(group, actor, opponent, staked, self.now())?;
                self.open_session(session).await
            }
            Action::SelectGame { session, game } => {
                self.drive(group, session, SessionEvent::SelectGame { actor, game })
                    .await
            }
            Action::SetRounds { session, rounds } => {
                self.drive(group, session, SessionEvent::SetRounds { actor, rounds })
                    .await
            }
            Action::StakePoints { session, amount } => {
                let balance = self.balance(group, actor).await;
                let stake = Stake::points(amount, balance)?;
                self.drive(group, session, SessionEvent::Stake { actor, stake })
                    .await
            }
            Action::StakeMedia { session, content } => {
                let stake = Stake::media(&content)?;
                let reply = self
                    .drive(
                        group,
                        session,
                        SessionEvent::Stake {
                            actor,
                            stake: stake.clone(),
                        },
                    )
                    .await?;
                self.record_media_stake(group, actor, session, &stake).await?;
                Ok(reply)
            }
            Action::ConfirmSetup { session } => {
                self.drive(group, session, SessionEvent::Confirm { actor }).await
            }
            Action::RestartSetup { session } => {
                self.drive(group, session, SessionEvent::Restart { actor }).await
            }
            Action::AbortSetup { session } => {
                self.drive(group, session, SessionEvent::Abort { actor }).await
            }
            Action::Respond { session, accept } => {
                self.drive(group, session, SessionEvent::Respond { actor, accept })
                    .await
            }
            Action::Play { session, play } => {
                self.drive(group, session, SessionEvent::Move { actor, play })
                    .await
            }
            Action::RollDie { session } => {
                let value = dice::roll(&mut *self.inner.rng.lock().await);
                let play = Move::Roll { value };
                self.drive(group, session, SessionEvent::Move { actor, play })
                    .await
            }
            Action::Revenge { session } => self.revenge(group, actor, session).await,
            Action::TruthOrDare { kind } => self.open_tod(group, actor, kind).await,
            Action::TodRespond { session, accept } => {
                self.tod_respond(group, actor, session, accept).await
            }
            Action::Submit { content } => self.submit_proof(group, actor, &content).await,
            Action::StopGame => {
                let id = self.require_active(group).await?;
                self.drive(group, id, SessionEvent::Stop).await
            }
            Action::DeclareLoser { user } => {
                let id = self.require_active(group).await?;
                self.drive(group, id, SessionEvent::DeclareLoser { loser: user })
                    .await
            }
            Action::AddPoints { amount, .. } | Action::RemovePoints { amount, .. }
                if amount <= 0 =>
            {
                Err(LedgerError::NonPositiveAmount(amount).into())
            }
            Action::AddPoints { user, amount } => self.adjust_points(group, user, amount).await,
            Action::RemovePoints { user, amount } => {
                self.adjust_points(group, user, -amount).await
            }
            Action::Balance { user } => {
                let user = user.unwrap_or(actor);
                Ok(Reply::Balance {
                    user,
                    balance: self.balance(group, user).await,
                })
            }
            Action::Leaderboard => {
                let rows = self
                    .inner
                    .stores
                    .ledger
                    .lock()
                    .await
                    .top(group, self.inner.config.leaderboard_size);
                Ok(Reply::Leaderboard { rows })
            }
            Action::Spin => self.spin(group, actor).await,
            Action::PurgeCompleted => {
                let count = self.purge_completed().await?;
                Ok(Reply::Purged { count })
            }
            Action::StakeAudit { user } => {
                let entries = self.inner.stores.audit.lock().await.for_user(group, user);
                Ok(Reply::Audit { entries })
            }
        }
    }

    async fn is_admin(&self, group: GroupId, user: UserId) -> bool {
        self.inner.dispatcher.admins(group).await.contains(&user)
    }

    async fn require_active(&self, group: GroupId) -> EngineResult<SessionId> {
        self.active_session(group)
            .await
            .map(|s| s.id)
            .ok_or_else(|| EngineError::Validation("there is no game in progress".into()))
    }

    // ------------------------------------------------------------------
    // Two-player sessions
    // ------------------------------------------------------------------

    /// Insert a fresh session unless the group already has one running.
    /// The check and the insert share one critical section.
    async fn open_session(&self, session: Session) -> EngineResult<Reply> {
        let group = session.group;
        {
            let mut games = self.inner.stores.games.lock().await;
            if games
                .find(|s| s.group == group && !s.status.is_complete())
                .is_some()
            {
                return Err(EngineError::GroupBusy(group));
            }
            games.put(session.clone())?;
        }
        info!(
            session = %session.id,
            %group,
            challenger = %session.challenger,
            opponent = %session.opponent,
            revenge = session.revenge_of.is_some(),
            "session opened"
        );
        let sent = self
            .inner
            .dispatcher
            .deliver(group, &session.opening_notice())
            .await;
        self.track(session.id, sent).await?;
        Ok(Reply::Opened {
            session: session.id,
        })
    }

    async fn revenge(&self, group: GroupId, actor: UserId, old: SessionId) -> EngineResult<Reply> {
        let previous = self
            .inner
            .stores
            .games
            .lock()
            .await
            .get(&old)
            .filter(|s| s.group == group)
            .cloned()
            .ok_or(EngineError::SessionNotFound(old))?;
        let session = Session::revenge(&previous, actor, self.now())?;
        self.open_session(session).await
    }

    /// Apply one event to a session and carry out its effects.
    async fn drive(&self, group: GroupId, id: SessionId, event: SessionEvent) -> EngineResult<Reply> {
        let step = self.step(Some(group), id, event).await?;
        let status = step.session.status;
        self.after_step(step).await?;
        Ok(Reply::Updated {
            session: id,
            status,
        })
    }

    async fn step(
        &self,
        group: Option<GroupId>,
        id: SessionId,
        event: SessionEvent,
    ) -> EngineResult<Step> {
        let now = self.now();
        let mut games = self.inner.stores.games.lock().await;
        let current = games
            .get(&id)
            .filter(|s| group.is_none_or(|g| s.group == g))
            .ok_or(EngineError::SessionNotFound(id))?;
        let step = current.step(
            event,
            &StepContext {
                now,
                config: &self.inner.config,
            },
        )?;
        let aborted = matches!(
            step.session.resolution,
            Some(Resolution::Cancelled {
                reason: CancelReason::Aborted,
                ..
            })
        );
        if aborted {
            games.delete(&id)?;
        } else {
            games.put(step.session.clone())?;
        }
        debug!(session = %id, status = %step.session.status, "session stepped");
        Ok(step)
    }

    async fn after_step(&self, step: Step) -> EngineResult<()> {
        let group = step.session.group;
        if step.completed {
            return self.finish(&step.session, &step.notices).await;
        }
        let sent = self.inner.dispatcher.deliver_all(group, &step.notices).await;
        self.track(step.session.id, sent).await
    }

    /// Remember messages to delete once the session completes. If another
    /// handler completed it in the meantime, delete them now.
    async fn track(&self, id: SessionId, sent: Vec<MessageRef>) -> EngineResult<()> {
        if sent.is_empty() {
            return Ok(());
        }
        let orphaned = {
            let mut games = self.inner.stores.games.lock().await;
            match games.get(&id).cloned() {
                Some(mut session) if !session.status.is_complete() => {
                    session.tracked_messages.extend(sent);
                    games.put(session)?;
                    None
                }
                Some(_) => Some(sent),
                None => None,
            }
        };
        if let Some(sent) = orphaned {
            debug!(session = %id, count = sent.len(), "session already complete, deleting messages");
            self.inner.dispatcher.delete_all(&sent).await;
        }
        Ok(())
    }

    /// Settle a session that was just persisted as complete.
    async fn finish(&self, session: &Session, notices: &[Notice]) -> EngineResult<()> {
        let group = session.group;
        let settlement = settle(session);
        info!(
            session = %session.id,
            %group,
            resolution = ?session.resolution,
            deltas = settlement.deltas.len(),
            trophies = settlement.trophies.len(),
            "session complete"
        );

        let mut reports = Vec::new();
        for &(user, delta) in &settlement.deltas {
            reports.push(self.apply_delta_quietly(group, user, delta).await?);
        }

        let dispatcher = &self.inner.dispatcher;
        for trophy in &settlement.trophies {
            dispatcher.expose(group, trophy).await;
        }
        dispatcher.deliver_all(group, notices).await;
        if !settlement.deltas.is_empty() {
            dispatcher
                .deliver(
                    group,
                    &Notice::Settled {
                        session: session.id,
                        deltas: settlement.deltas.clone(),
                    },
                )
                .await;
        }
        for report in &reports {
            self.announce_effects(report).await;
        }

        dispatcher.delete_all(&session.tracked_messages).await;
        if !session.tracked_messages.is_empty() {
            let mut games = self.inner.stores.games.lock().await;
            if let Some(stored) = games.get(&session.id) {
                let mut cleared = stored.clone();
                cleared.tracked_messages.clear();
                games.put(cleared)?;
            }
        }
        Ok(())
    }

    async fn record_media_stake(
        &self,
        group: GroupId,
        user: UserId,
        session: SessionId,
        stake: &Stake,
    ) -> EngineResult<()> {
        let Stake::Media { kind, reference } = stake else {
            return Ok(());
        };
        let entry = AuditEntry {
            group,
            user,
            session,
            kind: *kind,
            reference: reference.clone(),
            at: self.now(),
        };
        self.inner
            .stores
            .audit
            .lock()
            .await
            .mutate(|audit| audit.record(entry))?;
        Ok(())
    }

    /// Remove every completed session record. Returns how many were dropped.
    pub async fn purge_completed(&self) -> EngineResult<usize> {
        let mut games = self.inner.stores.games.lock().await;
        let count = games.mutate(|t| t.retain(|s| !s.status.is_complete()))?;
        info!(count, "purged completed sessions");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------

    /// Change a balance and announce the resulting punishments and mutes.
    pub async fn apply_delta(
        &self,
        group: GroupId,
        user: UserId,
        delta: i64,
    ) -> EngineResult<DeltaReport> {
        let report = self.apply_delta_quietly(group, user, delta).await?;
        self.announce_effects(&report).await;
        Ok(report)
    }

    async fn apply_delta_quietly(
        &self,
        group: GroupId,
        user: UserId,
        delta: i64,
    ) -> EngineResult<DeltaReport> {
        self.adjust_with(group, user, |_| delta).await
    }

    /// Compute the delta from the current balance and apply it, all in one
    /// critical section.
    async fn adjust_with(
        &self,
        group: GroupId,
        user: UserId,
        delta: impl FnOnce(i64) -> i64,
    ) -> EngineResult<DeltaReport> {
        let now = self.now();
        let book = &self.inner.settings.group(group).punishments;
        let policy = self.inner.config.strike_policy();
        let mut ledger = self.inner.stores.ledger.lock().await;
        let delta = delta(ledger.balance(group, user));
        let report = ledger.mutate(|l| l.apply_delta(group, user, delta, book, &policy, now))?;
        Ok(report)
    }

    async fn announce_effects(&self, report: &DeltaReport) {
        let group = report.group;
        let user = report.user;
        for effect in &report.effects {
            let notice = match effect {
                LedgerEffect::PunishmentFired(rule) => {
                    info!(%group, %user, threshold = rule.threshold, "punishment fired");
                    Notice::PunishmentFired {
                        user,
                        message: rule.message.clone(),
                        threshold: rule.threshold,
                        balance: report.after,
                    }
                }
                LedgerEffect::Muted { strike, until } => {
                    info!(%group, %user, strike, %until, "muting for negative balance");
                    self.inner.dispatcher.restrict(group, user, *until).await;
                    Notice::Muted {
                        user,
                        strike: *strike,
                        until: *until,
                    }
                }
                LedgerEffect::StrikeLimit { balance } => {
                    warn!(%group, %user, balance, "strike limit reached");
                    Notice::StrikeLimit {
                        user,
                        balance: *balance,
                    }
                }
            };
            self.inner.dispatcher.deliver(group, &notice).await;
        }
    }

    async fn adjust_points(&self, group: GroupId, user: UserId, delta: i64) -> EngineResult<Reply> {
        let report = self.apply_delta_quietly(group, user, delta).await?;
        info!(%group, %user, delta, balance = report.balance, "points adjusted");
        self.inner
            .dispatcher
            .deliver(
                group,
                &Notice::PointsAdjusted {
                    user,
                    delta,
                    balance: report.balance,
                },
            )
            .await;
        self.announce_effects(&report).await;
        Ok(Reply::Balance {
            user,
            balance: report.balance,
        })
    }

    async fn spin(&self, group: GroupId, actor: UserId) -> EngineResult<Reply> {
        let today = self.now().date_naive();
        let limit = self.inner.config.chance_daily_plays;
        let (outcome, remaining) = {
            let mut book = self.inner.stores.chance.lock().await;
            let mut rng = self.inner.rng.lock().await;
            let outcome = book.mutate(|b| b.spin(group, actor, today, limit, &mut *rng))??;
            (outcome, book.remaining(group, actor, today, limit))
        };
        info!(%group, %actor, ?outcome, remaining, "chance wheel spun");

        let report = if outcome.delta(0).is_some() {
            let report = self
                .adjust_with(group, actor, |balance| {
                    outcome.delta(balance).unwrap_or_default()
                })
                .await?;
            Some(report)
        } else {
            None
        };
        self.inner
            .dispatcher
            .deliver(group, &Notice::ChanceSpun {
                user: actor,
                outcome,
            })
            .await;
        if let Some(report) = report {
            self.announce_effects(&report).await;
        }
        Ok(Reply::Spun { outcome, remaining })
    }

    // ------------------------------------------------------------------
    // Truth or dare
    // ------------------------------------------------------------------

    async fn open_tod(&self, group: GroupId, actor: UserId, kind: PromptKind) -> EngineResult<Reply> {
        let pool = kind.pool(self.inner.settings.group(group));
        let prompt = {
            let mut rng = self.inner.rng.lock().await;
            pick_prompt(pool, &mut *rng).map(str::to_owned)
        }
        .ok_or_else(|| {
            EngineError::Validation(format!("no {kind} prompts are configured for this group"))
        })?;

        let tod = TodSession::open(group, actor, kind, prompt, self.now());
        {
            let mut tods = self.inner.stores.tods.lock().await;
            if tods.find(|t| t.group == group && t.user == actor).is_some() {
                return Err(EngineError::TodAlreadyOpen);
            }
            tods.put(tod.clone())?;
        }
        info!(session = %tod.id, %group, user = %actor, %kind, "truth or dare opened");

        let notice = Notice::TodPrompt {
            session: tod.id,
            user: actor,
            kind,
            prompt: tod.prompt.clone(),
        };
        let sent = self.inner.dispatcher.deliver(group, &notice).await;
        if let Some(&message) = sent.first() {
            let mut tods = self.inner.stores.tods.lock().await;
            if let Some(current) = tods.get(&tod.id) {
                let mut current = current.clone();
                current.message = Some(message);
                tods.put(current)?;
            }
        }
        Ok(Reply::Tod {
            session: tod.id,
            open: true,
        })
    }

    async fn tod_respond(
        &self,
        group: GroupId,
        actor: UserId,
        id: SessionId,
        accept: bool,
    ) -> EngineResult<Reply> {
        let tod = {
            let mut tods = self.inner.stores.tods.lock().await;
            let mut tod = tods
                .get(&id)
                .filter(|t| t.group == group)
                .cloned()
                .ok_or(EngineError::SessionNotFound(id))?;
            if accept {
                tod.accept(actor, self.now())?;
                tods.put(tod.clone())?;
            } else {
                tod.ensure_subject(actor)?;
                if tod.status != TodStatus::PendingAcceptance {
                    return Err(EngineError::Validation(
                        "this prompt was already accepted".into(),
                    ));
                }
                tods.delete(&id)?;
            }
            tod
        };

        let dispatcher = &self.inner.dispatcher;
        if accept {
            info!(session = %id, user = %actor, "truth or dare accepted");
            if let Some(message) = tod.message {
                let text = format!(
                    "{} accepted: {}\n{}.",
                    tod.kind,
                    tod.prompt,
                    capitalize(tod.kind.proof_hint())
                );
                dispatcher.edit(message, &text).await;
            }
        } else {
            info!(session = %id, user = %actor, "truth or dare refused");
            if let Some(message) = tod.message {
                dispatcher
                    .edit(message, &format!("{} refused: {}", tod.kind, tod.prompt))
                    .await;
            }
            dispatcher
                .deliver(
                    group,
                    &Notice::TodRefused {
                        user: actor,
                        kind: tod.kind,
                        prompt: tod.prompt.clone(),
                    },
                )
                .await;
        }
        Ok(Reply::Tod {
            session: id,
            open: accept,
        })
    }

    /// Check a message against the sender's open prompt in this group.
    async fn submit_proof(
        &self,
        group: GroupId,
        actor: UserId,
        content: &Content,
    ) -> EngineResult<Reply> {
        let tod = {
            let mut tods = self.inner.stores.tods.lock().await;
            let Some(tod) = tods
                .find(|t| {
                    t.group == group && t.user == actor && t.status == TodStatus::AwaitingProof
                })
                .cloned()
            else {
                return Ok(Reply::Ignored);
            };
            tod.check_proof(content)?;
            tods.delete(&tod.id)?;
            tod
        };

        let reward = self.inner.config.proof_reward;
        let report = self.apply_delta_quietly(group, actor, reward).await?;
        info!(session = %tod.id, user = %actor, reward, "proof accepted");
        let dispatcher = &self.inner.dispatcher;
        if let Some(message) = tod.message {
            dispatcher
                .edit(message, &format!("{} completed: {}", tod.kind, tod.prompt))
                .await;
        }
        dispatcher
            .deliver(
                group,
                &Notice::TodCompleted {
                    user: actor,
                    kind: tod.kind,
                    reward,
                },
            )
            .await;
        self.announce_effects(&report).await;
        Ok(Reply::ProofAccepted { reward })
    }

    // ------------------------------------------------------------------
    // Scheduler entry points
    // ------------------------------------------------------------------

    /// Apply a planned inactivity action to a two-player session. The plan
    /// is re-checked under the lock; a stale plan yields
    /// [`EngineError::Stale`].
    pub async fn sweep_game(&self, id: SessionId, plan: GameSweep) -> EngineResult<()> {
        let event = match plan {
            GameSweep::ExpireAcceptance => SessionEvent::ExpireAcceptance,
            GameSweep::Warn => SessionEvent::Warn,
            GameSweep::Timeout => SessionEvent::Timeout,
        };
        let step = self.step(None, id, event).await?;
        info!(session = %id, ?plan, "inactivity action applied");
        self.after_step(step).await
    }

    /// Apply a planned inactivity action to a truth-or-dare session.
    pub async fn sweep_tod(&self, id: SessionId, plan: TodSweep) -> EngineResult<()> {
        let now = self.now();
        let tod = {
            let mut tods = self.inner.stores.tods.lock().await;
            let current = tods.get(&id).cloned().ok_or(EngineError::SessionNotFound(id))?;
            if scheduler::plan_tod(&current, now, &self.inner.config) != Some(plan) {
                return Err(EngineError::Stale(id));
            }
            match plan {
                TodSweep::Warn => {
                    let mut warned = current.clone();
                    warned.warning_sent = true;
                    tods.put(warned)?;
                }
                TodSweep::Expire | TodSweep::Timeout => {
                    tods.delete(&id)?;
                }
            }
            current
        };
        info!(session = %id, user = %tod.user, ?plan, "truth or dare inactivity action applied");

        let dispatcher = &self.inner.dispatcher;
        match plan {
            TodSweep::Expire => {
                if let Some(message) = tod.message {
                    dispatcher
                        .edit(message, &format!("{} expired: {}", tod.kind, tod.prompt))
                        .await;
                }
            }
            TodSweep::Warn => {
                dispatcher
                    .deliver(
                        tod.group,
                        &Notice::TodWarning {
                            user: tod.user,
                            kind: tod.kind,
                            remaining_secs: self.inner.config.warning_lead().num_seconds(),
                        },
                    )
                    .await;
            }
            TodSweep::Timeout => {
                let penalty = self.inner.config.proof_timeout_penalty;
                let report = self.apply_delta_quietly(tod.group, tod.user, -penalty).await?;
                if let Some(message) = tod.message {
                    dispatcher
                        .edit(message, &format!("{} timed out: {}", tod.kind, tod.prompt))
                        .await;
                }
                dispatcher
                    .deliver(
                        tod.group,
                        &Notice::TodTimedOut {
                            user: tod.user,
                            kind: tod.kind,
                            prompt: tod.prompt.clone(),
                            penalty,
                        },
                    )
                    .await;
                self.announce_effects(&report).await;
            }
        }
        Ok(())
    }

    pub(crate) async fn plan_sweep(&self) -> (Vec<(SessionId, GameSweep)>, Vec<(SessionId, TodSweep)>) {
        let now = self.now();
        let config = &self.inner.config;
        let games = self
            .inner
            .stores
            .games
            .lock()
            .await
            .list()
            .filter_map(|s| scheduler::plan_game(s, now, config).map(|p| (s.id, p)))
            .collect();
        let tods = self
            .inner
            .stores
            .tods
            .lock()
            .await
            .list()
            .filter_map(|t| scheduler::plan_tod(t, now, config).map(|p| (t.id, p)))
            .collect();
        (games, tods)
    }
}

#[cfg(test)]
mod tests {
    use parlor_core::Chat;
    use parlor_games::GameKind;

    use super::*;
    use crate::messenger::{RecordingMessenger, Sent};

    const G: GroupId = GroupId(-7);
    const ANN: UserId = UserId(1);
    const BO: UserId = UserId(2);

    #[tokio::test]
    async fn late_tracked_messages_are_deleted() {
        let messenger = Arc::new(RecordingMessenger::new());
        let engine = EngineBuilder::new(messenger.clone()).build().unwrap();
        let reply = engine
            .handle(
                ANN,
                G,
                Action::Challenge {
                    opponent: BO,
                    staked: false,
                },
            )
            .await
            .unwrap();
        let Reply::Opened { session: id } = reply else {
            panic!("unexpected reply {reply:?}");
        };
        engine
            .handle(
                ANN,
                G,
                Action::SelectGame {
                    session: id,
                    game: GameKind::TicTacToe,
                },
            )
            .await
            .unwrap();
        for (user, cell) in [(ANN, 0), (BO, 3), (ANN, 1), (BO, 4), (ANN, 2)] {
            engine
                .handle(
                    user,
                    G,
                    Action::Play {
                        session: id,
                        play: Move::Mark { cell },
                    },
                )
                .await
                .unwrap();
        }
        assert!(engine.session(id).await.unwrap().status.is_complete());

        let late = MessageRef {
            chat: Chat::Group(G),
            message_id: 9_999,
        };
        engine.track(id, vec![late]).await.unwrap();

        let sent = messenger.sent().await;
        assert!(sent.contains(&Sent::Delete { message: late }));
        assert!(engine.session(id).await.unwrap().tracked_messages.is_empty());
    }
}
