//! Periodic inactivity sweep.
//!
//! Each tick plans actions from a snapshot taken under the store locks, then
//! applies them one by one through the [`Engine`], which re-checks every
//! plan against the current record. A session can outlive its deadline by
//! up to one period.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::session::{Session, SessionStatus};
use crate::tod::{TodSession, TodStatus};

/// Inactivity action for a two-player session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameSweep {
    /// The opponent never answered; cancel without forfeiture.
    ExpireAcceptance,
    /// Send the one-time warning.
    Warn,
    /// Cancel, forfeiting stakes once accepted.
    Timeout,
}

/// Inactivity action for a truth-or-dare session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodSweep {
    /// The prompt was never accepted; drop it without penalty.
    Expire,
    /// Send the one-time warning.
    Warn,
    /// Proof never arrived; deduct the penalty.
    Timeout,
}

/// What a game session needs, if anything. Thresholds are strict.
pub fn plan_game(session: &Session, now: DateTime<Utc>, config: &EngineConfig) -> Option<GameSweep> {
    let idle = session.idle(now);
    match session.status {
        SessionStatus::Complete => None,
        SessionStatus::PendingOpponentAcceptance => {
            (idle > config.acceptance_grace()).then_some(GameSweep::ExpireAcceptance)
        }
        _ if idle > config.timeout_after() => Some(GameSweep::Timeout),
        _ if idle > config.warning_after() && !session.warning_sent => Some(GameSweep::Warn),
        _ => None,
    }
}

/// What a truth-or-dare session needs, if anything.
pub fn plan_tod(tod: &TodSession, now: DateTime<Utc>, config: &EngineConfig) -> Option<TodSweep> {
    let idle = tod.idle(now);
    match tod.status {
        TodStatus::PendingAcceptance => {
            (idle > config.acceptance_grace()).then_some(TodSweep::Expire)
        }
        TodStatus::AwaitingProof if idle > config.timeout_after() => Some(TodSweep::Timeout),
        TodStatus::AwaitingProof if idle > config.warning_after() && !tod.warning_sent => {
            Some(TodSweep::Warn)
        }
        TodStatus::AwaitingProof => None,
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Unanswered challenges and prompts dropped.
    pub expired: usize,
    /// Warnings sent.
    pub warned: usize,
    /// Penalized timeouts.
    pub timed_out: usize,
    /// Plans that no longer applied when re-checked.
    pub skipped: usize,
    /// Plans that failed.
    pub failed: usize,
}

impl SweepReport {
    /// Whether the sweep changed anything.
    pub fn is_idle(&self) -> bool {
        self.expired + self.warned + self.timed_out == 0
    }
}

/// Drives the sweep on the configured period.
#[derive(Clone)]
pub struct Scheduler {
    engine: Engine,
}

impl Scheduler {
    /// Sweep `engine`'s stores.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Run one sweep over both session families.
    pub async fn sweep(&self) -> SweepReport {
        let (games, tods) = self.engine.plan_sweep().await;
        let mut report = SweepReport::default();

        for (id, plan) in games {
            let result = self.engine.sweep_game(id, plan).await;
            let slot = match plan {
                GameSweep::ExpireAcceptance => &mut report.expired,
                GameSweep::Warn => &mut report.warned,
                GameSweep::Timeout => &mut report.timed_out,
            };
            tally(&mut report.skipped, &mut report.failed, slot, result, id);
        }
        for (id, plan) in tods {
            let result = self.engine.sweep_tod(id, plan).await;
            let slot = match plan {
                TodSweep::Expire => &mut report.expired,
                TodSweep::Warn => &mut report.warned,
                TodSweep::Timeout => &mut report.timed_out,
            };
            tally(&mut report.skipped, &mut report.failed, slot, result, id);
        }

        if !report.is_idle() {
            info!(?report, "sweep finished");
        }
        report
    }

    /// Sweep every period until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.engine.config().sweep_period();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

fn tally(
    skipped: &mut usize,
    failed: &mut usize,
    done: &mut usize,
    result: crate::error::EngineResult<()>,
    id: parlor_core::SessionId,
) {
    match result {
        Ok(()) => *done += 1,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(session = %id, reason = %e, "sweep plan skipped");
            *skipped += 1;
        }
        Err(e) => {
            error!(session = %id, error = %e, "sweep action failed");
            *failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use parlor_core::{GroupId, UserId};

    use super::*;
    use crate::tod::PromptKind;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    fn session(status: SessionStatus) -> Session {
        let mut s = Session::new(GroupId(1), UserId(1), UserId(2), true, t0()).unwrap();
        s.status = status;
        s
    }

    #[test]
    fn acceptance_grace_has_priority() {
        let cfg = EngineConfig::default();
        let s = session(SessionStatus::PendingOpponentAcceptance);
        assert_eq!(plan_game(&s, t0() + secs(120), &cfg), None);
        assert_eq!(
            plan_game(&s, t0() + secs(121), &cfg),
            Some(GameSweep::ExpireAcceptance)
        );
        assert_eq!(
            plan_game(&s, t0() + secs(1000), &cfg),
            Some(GameSweep::ExpireAcceptance)
        );
    }

    #[test]
    fn warning_then_timeout() {
        let cfg = EngineConfig::default();
        let mut s = session(SessionStatus::Active);
        assert_eq!(plan_game(&s, t0() + secs(300), &cfg), None);
        assert_eq!(plan_game(&s, t0() + secs(301), &cfg), Some(GameSweep::Warn));
        s.warning_sent = true;
        assert_eq!(plan_game(&s, t0() + secs(400), &cfg), None);
        assert_eq!(plan_game(&s, t0() + secs(421), &cfg), Some(GameSweep::Timeout));
        assert_eq!(plan_game(&session(SessionStatus::Complete), t0() + secs(9999), &cfg), None);
    }

    #[test]
    fn setup_sessions_time_out_too() {
        let cfg = EngineConfig::default();
        let s = session(SessionStatus::PendingGameSelection);
        assert_eq!(plan_game(&s, t0() + secs(421), &cfg), Some(GameSweep::Timeout));
    }

    #[test]
    fn tod_tiers() {
        let cfg = EngineConfig::default();
        let mut tod = TodSession::open(GroupId(1), UserId(3), PromptKind::Truth, "why", t0());
        assert_eq!(plan_tod(&tod, t0() + secs(121), &cfg), Some(TodSweep::Expire));
        tod.accept(UserId(3), t0()).unwrap();
        assert_eq!(plan_tod(&tod, t0() + secs(121), &cfg), None);
        assert_eq!(plan_tod(&tod, t0() + secs(301), &cfg), Some(TodSweep::Warn));
        tod.warning_sent = true;
        assert_eq!(plan_tod(&tod, t0() + secs(301), &cfg), None);
        assert_eq!(plan_tod(&tod, t0() + secs(421), &cfg), Some(TodSweep::Timeout));
    }
}
