//! Engine configuration and per-group settings.
//!
//! [`EngineConfig`] holds the timing windows and point constants. It loads
//! from JSON with every field optional. [`Settings`] holds the read-only
//! per-group punishment rules and truth-or-dare prompt pools.

use std::collections::HashMap;
use std::path::Path;

use chrono::TimeDelta;
use parlor_core::GroupId;
use parlor_games::dice::ROUND_OPTIONS;
use parlor_ledger::{PunishmentBook, StrikePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Timing and scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between scheduler sweeps.
    pub sweep_period_secs: u64,
    /// Idle seconds after which an unanswered challenge lapses without penalty.
    pub acceptance_grace_secs: u64,
    /// Idle seconds after which a single inactivity warning is sent.
    pub warning_after_secs: u64,
    /// Idle seconds after which a session is cancelled.
    pub timeout_after_secs: u64,
    /// Points awarded for valid truth-or-dare proof.
    pub proof_reward: i64,
    /// Points deducted when truth-or-dare proof times out.
    pub proof_timeout_penalty: i64,
    /// Hours a user is muted for a negative-balance strike.
    pub mute_hours: i64,
    /// Strike count that escalates instead of muting.
    pub strike_limit: u8,
    /// Best-of round counts offered for dice.
    pub dice_rounds: Vec<u8>,
    /// Entries shown on the leaderboard.
    pub leaderboard_size: usize,
    /// Chance wheel spins per user per UTC day.
    pub chance_daily_plays: u8,
    /// RNG seed for reproducible prompts and rolls.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_period_secs: 60,
            acceptance_grace_secs: 120,
            warning_after_secs: 300,
            timeout_after_secs: 420,
            proof_reward: 15,
            proof_timeout_penalty: 15,
            mute_hours: 24,
            strike_limit: 3,
            dice_rounds: ROUND_OPTIONS.to_vec(),
            leaderboard_size: 5,
            chance_daily_plays: 3,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the windows are ordered and the constants usable.
    pub fn validate(&self) -> EngineResult<()> {
        if self.sweep_period_secs == 0 {
            return Err(EngineError::Config("sweep period must be positive".into()));
        }
        if self.warning_after_secs >= self.timeout_after_secs {
            return Err(EngineError::Config(
                "warning window must be shorter than the timeout window".into(),
            ));
        }
        if self.acceptance_grace_secs >= self.timeout_after_secs {
            return Err(EngineError::Config(
                "acceptance grace must be shorter than the timeout window".into(),
            ));
        }
        if self.strike_limit == 0 {
            return Err(EngineError::Config("strike limit must be at least 1".into()));
        }
        if self.dice_rounds.is_empty() {
            return Err(EngineError::Config("at least one dice round count is required".into()));
        }
        if let Some(bad) = self.dice_rounds.iter().find(|r| !ROUND_OPTIONS.contains(*r)) {
            return Err(EngineError::Config(format!(
                "unsupported dice round count {bad}, expected one of {ROUND_OPTIONS:?}"
            )));
        }
        if self.mute_hours <= 0 || TimeDelta::try_hours(self.mute_hours).is_none() {
            return Err(EngineError::Config(format!(
                "mute duration must be a positive number of hours, got {}",
                self.mute_hours
            )));
        }
        if self.proof_reward < 0 || self.proof_timeout_penalty < 0 {
            return Err(EngineError::Config("proof points must not be negative".into()));
        }
        Ok(())
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the acceptance grace, warning, and timeout windows, in seconds.
    pub fn with_windows(mut self, grace: u64, warning: u64, timeout: u64) -> Self {
        self.acceptance_grace_secs = grace;
        self.warning_after_secs = warning;
        self.timeout_after_secs = timeout;
        self
    }

    /// Set the scheduler period in seconds (at least 1).
    pub fn with_sweep_period(mut self, secs: u64) -> Self {
        self.sweep_period_secs = secs.max(1);
        self
    }

    /// Set the truth-or-dare reward and timeout penalty.
    pub fn with_proof_points(mut self, reward: i64, penalty: i64) -> Self {
        self.proof_reward = reward;
        self.proof_timeout_penalty = penalty;
        self
    }

    /// Scheduler period.
    pub fn sweep_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_period_secs)
    }

    /// Acceptance grace window.
    pub fn acceptance_grace(&self) -> TimeDelta {
        secs(self.acceptance_grace_secs)
    }

    /// Warning window.
    pub fn warning_after(&self) -> TimeDelta {
        secs(self.warning_after_secs)
    }

    /// Timeout window.
    pub fn timeout_after(&self) -> TimeDelta {
        secs(self.timeout_after_secs)
    }

    /// Time left between the warning and the timeout.
    pub fn warning_lead(&self) -> TimeDelta {
        self.timeout_after() - self.warning_after()
    }

    /// Strike ladder derived from the mute settings.
    pub fn strike_policy(&self) -> StrikePolicy {
        StrikePolicy {
            mute_for: TimeDelta::try_hours(self.mute_hours).unwrap_or(TimeDelta::MAX),
            limit: self.strike_limit,
        }
    }
}

fn secs(n: u64) -> TimeDelta {
    i64::try_from(n)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Read-only settings for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    /// Punishment thresholds.
    pub punishments: PunishmentBook,
    /// Truth prompt pool.
    pub truths: Vec<String>,
    /// Dare prompt pool.
    pub dares: Vec<String>,
}

/// Settings for every group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Settings by group.
    pub groups: HashMap<GroupId, GroupSettings>,
}

impl Settings {
    /// Load a settings file.
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
    }

    /// Settings for a group; empty if none are configured.
    pub fn group(&self, group: GroupId) -> &GroupSettings {
        static EMPTY: std::sync::OnceLock<GroupSettings> = std::sync::OnceLock::new();
        self.groups
            .get(&group)
            .unwrap_or_else(|| EMPTY.get_or_init(GroupSettings::default))
    }

    /// Replace the settings of one group.
    pub fn with_group(mut self, group: GroupId, settings: GroupSettings) -> Self {
        self.groups.insert(group, settings);
        self
    }
}

#[cfg(test)]
mod tests {
    use parlor_ledger::PunishmentRule;

    use super::*;

    #[test]
    fn default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sweep_period_secs, 60);
        assert_eq!(cfg.acceptance_grace_secs, 120);
        assert_eq!(cfg.warning_after_secs, 300);
        assert_eq!(cfg.timeout_after_secs, 420);
        assert_eq!(cfg.proof_reward, 15);
        assert_eq!(cfg.dice_rounds, vec![3, 5, 9]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.warning_lead(), TimeDelta::minutes(2));
    }

    #[test]
    fn builder_methods() {
        let cfg = EngineConfig::default()
            .with_seed(7)
            .with_windows(10, 20, 30)
            .with_sweep_period(0)
            .with_proof_points(5, 8);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.timeout_after(), TimeDelta::seconds(30));
        assert_eq!(cfg.sweep_period_secs, 1);
        assert_eq!(cfg.proof_timeout_penalty, 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_windows() {
        assert!(EngineConfig::default().with_windows(10, 50, 40).validate().is_err());
        assert!(EngineConfig::default().with_windows(60, 20, 50).validate().is_err());
    }

    #[test]
    fn rejects_unsupported_rounds() {
        let cfg = EngineConfig {
            dice_rounds: vec![3, 4],
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unusable_mute_durations() {
        for hours in [0, -5, 9_000_000_000_000_000] {
            let cfg = EngineConfig {
                mute_hours: hours,
                ..EngineConfig::default()
            };
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("mute duration"), "{hours}: {err}");
        }
        assert_eq!(EngineConfig::default().strike_policy().mute_for, TimeDelta::hours(24));
    }

    #[test]
    fn oversized_mute_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"mute_hours": 9000000000000000}"#).unwrap();
        assert!(EngineConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"timeout_after_secs": 600}"#).unwrap();
        assert_eq!(cfg.timeout_after_secs, 600);
        assert_eq!(cfg.warning_after_secs, 300);
    }

    #[test]
    fn settings_json() {
        let settings: Settings = serde_json::from_str(
            r#"{"groups": {"-100": {"punishments": [{"threshold": 0, "message": "lines"}],
                "dares": ["sing"]}}}"#,
        )
        .unwrap();
        let group = settings.group(GroupId(-100));
        assert_eq!(group.punishments.rules(), &[PunishmentRule::new(0, "lines")]);
        assert_eq!(group.dares, vec!["sing".to_string()]);
        assert!(group.truths.is_empty());
        assert!(settings.group(GroupId(1)).punishments.is_empty());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"seed": 9}"#).unwrap();
        assert_eq!(EngineConfig::from_json_file(&path).unwrap().seed, Some(9));
        std::fs::write(&path, r#"{"warning_after_secs": 999}"#).unwrap();
        assert!(EngineConfig::from_json_file(&path).is_err());
    }
}
