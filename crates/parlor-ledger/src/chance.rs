//! The daily chance wheel.
//!
//! Each user may spin a limited number of times per UTC day. Outcomes are
//! drawn from a fixed weighted table; point outcomes are applied by the
//! caller through the ledger like any other balance change.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use parlor_core::{GroupId, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// A possible result of a spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanceOutcome {
    /// Gain 50 points.
    PlusFifty,
    /// Lose 100 points.
    MinusHundred,
    /// Two days of chastity.
    ChastityTwoDays,
    /// Seven days of chastity.
    ChastitySevenDays,
    /// No effect.
    Nothing,
    /// One free reward from the shop.
    FreeReward,
    /// Balance drops to zero.
    LoseAll,
    /// Balance doubles.
    DoublePoints,
    /// The admins set a task.
    AskTask,
}

/// Outcomes with weights in tenths of a percent.
pub const WHEEL: [(ChanceOutcome, u32); 9] = [
    (ChanceOutcome::PlusFifty, 150),
    (ChanceOutcome::MinusHundred, 150),
    (ChanceOutcome::ChastityTwoDays, 150),
    (ChanceOutcome::ChastitySevenDays, 50),
    (ChanceOutcome::Nothing, 300),
    (ChanceOutcome::FreeReward, 100),
    (ChanceOutcome::LoseAll, 25),
    (ChanceOutcome::DoublePoints, 25),
    (ChanceOutcome::AskTask, 50),
];

impl ChanceOutcome {
    /// Draw an outcome from the weighted wheel.
    pub fn draw(rng: &mut impl Rng) -> Self {
        let total: u32 = WHEEL.iter().map(|(_, w)| w).sum();
        let mut pick = rng.random_range(0..total);
        for (outcome, weight) in WHEEL {
            if pick < weight {
                return outcome;
            }
            pick -= weight;
        }
        ChanceOutcome::Nothing
    }

    /// Ledger delta for this outcome given the current balance, if any.
    pub fn delta(self, balance: i64) -> Option<i64> {
        match self {
            ChanceOutcome::PlusFifty => Some(50),
            ChanceOutcome::MinusHundred => Some(-100),
            ChanceOutcome::LoseAll => Some(-balance.max(0)),
            ChanceOutcome::DoublePoints => Some(balance.max(0)),
            _ => None,
        }
    }

    /// Whether admins must be told about this outcome.
    pub fn needs_admin(self) -> bool {
        matches!(
            self,
            ChanceOutcome::ChastityTwoDays
                | ChanceOutcome::ChastitySevenDays
                | ChanceOutcome::FreeReward
                | ChanceOutcome::AskTask
        )
    }
}

impl fmt::Display for ChanceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChanceOutcome::PlusFifty => "+50 points",
            ChanceOutcome::MinusHundred => "-100 points",
            ChanceOutcome::ChastityTwoDays => "2 days of chastity",
            ChanceOutcome::ChastitySevenDays => "7 days of chastity",
            ChanceOutcome::Nothing => "nothing happens",
            ChanceOutcome::FreeReward => "a free reward",
            ChanceOutcome::LoseAll => "all points lost",
            ChanceOutcome::DoublePoints => "points doubled",
            ChanceOutcome::AskTask => "a task from the admins",
        };
        f.write_str(text)
    }
}

/// Spins used by one user on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// Group played in.
    pub group: GroupId,
    /// Player.
    pub user: UserId,
    /// UTC day of the last spin.
    pub day: NaiveDate,
    /// Spins on that day.
    pub count: u8,
}

/// Daily spin counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PlayRecord>", into = "Vec<PlayRecord>")]
pub struct ChanceBook {
    plays: HashMap<(GroupId, UserId), PlayRecord>,
}

impl From<Vec<PlayRecord>> for ChanceBook {
    fn from(list: Vec<PlayRecord>) -> Self {
        Self {
            plays: list.into_iter().map(|p| ((p.group, p.user), p)).collect(),
        }
    }
}

impl From<ChanceBook> for Vec<PlayRecord> {
    fn from(book: ChanceBook) -> Self {
        let mut list: Vec<PlayRecord> = book.plays.into_values().collect();
        list.sort_by_key(|p| (p.group, p.user));
        list
    }
}

impl ChanceBook {
    /// Spins left for `user` on `today`.
    pub fn remaining(&self, group: GroupId, user: UserId, today: NaiveDate, limit: u8) -> u8 {
        match self.plays.get(&(group, user)) {
            Some(p) if p.day == today => limit.saturating_sub(p.count),
            _ => limit,
        }
    }

    /// Spin the wheel, consuming one of today's plays.
    pub fn spin(
        &mut self,
        group: GroupId,
        user: UserId,
        today: NaiveDate,
        limit: u8,
        rng: &mut impl Rng,
    ) -> LedgerResult<ChanceOutcome> {
        if self.remaining(group, user, today, limit) == 0 {
            return Err(LedgerError::NoPlaysLeft { group, user });
        }
        let record = self.plays.entry((group, user)).or_insert(PlayRecord {
            group,
            user,
            day: today,
            count: 0,
        });
        if record.day != today {
            record.day = today;
            record.count = 0;
        }
        record.count += 1;
        Ok(ChanceOutcome::draw(rng))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn weights_sum_to_a_thousand() {
        assert_eq!(WHEEL.iter().map(|(_, w)| w).sum::<u32>(), 1000);
    }

    #[test]
    fn daily_limit() {
        let mut book = ChanceBook::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (g, u) = (GroupId(1), UserId(2));
        for _ in 0..3 {
            book.spin(g, u, day(1), 3, &mut rng).unwrap();
        }
        assert_eq!(book.remaining(g, u, day(1), 3), 0);
        assert_eq!(
            book.spin(g, u, day(1), 3, &mut rng),
            Err(LedgerError::NoPlaysLeft { group: g, user: u })
        );
        assert_eq!(book.remaining(g, u, day(2), 3), 3);
        book.spin(g, u, day(2), 3, &mut rng).unwrap();
        assert_eq!(book.remaining(g, u, day(2), 3), 2);
    }

    #[test]
    fn every_outcome_reachable() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5000 {
            seen.insert(ChanceOutcome::draw(&mut rng));
        }
        assert_eq!(seen.len(), WHEEL.len());
    }

    #[test]
    fn deltas() {
        assert_eq!(ChanceOutcome::LoseAll.delta(80), Some(-80));
        assert_eq!(ChanceOutcome::LoseAll.delta(-10), Some(0));
        assert_eq!(ChanceOutcome::DoublePoints.delta(40), Some(40));
        assert_eq!(ChanceOutcome::Nothing.delta(40), None);
        assert!(ChanceOutcome::AskTask.needs_admin());
    }
}
