//! Per-(group, user) balances and the punishment automaton.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use parlor_core::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::punishment::{PunishmentBook, PunishmentRule};

/// How the negative-balance strike ladder escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePolicy {
    /// How long a muted user stays muted.
    pub mute_for: TimeDelta,
    /// Strike count that escalates instead of muting.
    pub limit: u8,
}

impl Default for StrikePolicy {
    fn default() -> Self {
        Self {
            mute_for: TimeDelta::hours(24),
            limit: 3,
        }
    }
}

/// One user's standing in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Group the account belongs to.
    pub group: GroupId,
    /// Account holder.
    pub user: UserId,
    /// Current balance; may be negative.
    pub balance: i64,
    /// Consecutive negative excursions, always below the strike limit.
    #[serde(default)]
    pub strikes: u8,
    /// Punishment messages already announced for the current excursion.
    #[serde(default)]
    pub armed: BTreeSet<String>,
}

impl Account {
    fn new(group: GroupId, user: UserId) -> Self {
        Self {
            group,
            user,
            balance: 0,
            strikes: 0,
            armed: BTreeSet::new(),
        }
    }
}

/// A side effect the caller must carry out after a balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEffect {
    /// The balance crossed below a punishment threshold for the first time
    /// this excursion. Announce to the group and every admin.
    PunishmentFired(PunishmentRule),
    /// The balance went negative; mute the user until `until`. The balance
    /// has already been reset to zero.
    Muted {
        /// Strike number that caused the mute.
        strike: u8,
        /// End of the mute.
        until: DateTime<Utc>,
    },
    /// The strike limit was reached. Announce to the group and admins; the
    /// strike counter is back at zero.
    StrikeLimit {
        /// The balance left in place.
        balance: i64,
    },
}

/// Outcome of [`PointsLedger::apply_delta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaReport {
    /// Group affected.
    pub group: GroupId,
    /// User affected.
    pub user: UserId,
    /// Balance before the delta.
    pub before: i64,
    /// Balance immediately after the delta, as seen by the checks.
    pub after: i64,
    /// Balance stored once all checks ran.
    pub balance: i64,
    /// Side effects, in evaluation order.
    pub effects: Vec<LedgerEffect>,
}

/// All balances across all groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Account>", into = "Vec<Account>")]
pub struct PointsLedger {
    accounts: HashMap<(GroupId, UserId), Account>,
}

impl From<Vec<Account>> for PointsLedger {
    fn from(list: Vec<Account>) -> Self {
        Self {
            accounts: list.into_iter().map(|a| ((a.group, a.user), a)).collect(),
        }
    }
}

impl From<PointsLedger> for Vec<Account> {
    fn from(ledger: PointsLedger) -> Self {
        let mut list: Vec<Account> = ledger.accounts.into_values().collect();
        list.sort_by_key(|a| (a.group, a.user));
        list
    }
}

impl PointsLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance; zero for unknown users.
    pub fn balance(&self, group: GroupId, user: UserId) -> i64 {
        self.accounts
            .get(&(group, user))
            .map_or(0, |a| a.balance)
    }

    /// Account details, if the user has one.
    pub fn account(&self, group: GroupId, user: UserId) -> Option<&Account> {
        self.accounts.get(&(group, user))
    }

    /// Apply `delta` to a balance and run the punishment checks.
    ///
    /// The checks run in a fixed order against the post-delta balance:
    /// strike reset on a non-negative balance, then every punishment
    /// threshold, then the strike ladder on a negative balance. Threshold
    /// and strike effects are independent and can both fire from one delta.
    pub fn apply_delta(
        &mut self,
        group: GroupId,
        user: UserId,
        delta: i64,
        book: &PunishmentBook,
        policy: &StrikePolicy,
        now: DateTime<Utc>,
    ) -> DeltaReport {
        let account = self
            .accounts
            .entry((group, user))
            .or_insert_with(|| Account::new(group, user));
        let before = account.balance;
        let after = before.saturating_add(delta);
        account.balance = after;
        let mut effects = Vec::new();

        if after >= 0 && account.strikes != 0 {
            account.strikes = 0;
        }

        for rule in book.rules() {
            let armed = account.armed.contains(&rule.message);
            if before >= rule.threshold && after < rule.threshold && !armed {
                account.armed.insert(rule.message.clone());
                effects.push(LedgerEffect::PunishmentFired(rule.clone()));
            } else if after >= rule.threshold && armed {
                account.armed.remove(&rule.message);
            }
        }

        if after < 0 {
            account.strikes += 1;
            if account.strikes < policy.limit {
                account.balance = 0;
                effects.push(LedgerEffect::Muted {
                    strike: account.strikes,
                    until: now
                        .checked_add_signed(policy.mute_for)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                });
            } else {
                account.strikes = 0;
                effects.push(LedgerEffect::StrikeLimit { balance: after });
            }
        }

        debug!(%group, %user, before, after, balance = account.balance, "applied delta");
        DeltaReport {
            group,
            user,
            before,
            after,
            balance: account.balance,
            effects,
        }
    }

    /// The `n` highest balances in a group, ties broken by user id.
    pub fn top(&self, group: GroupId, n: usize) -> Vec<(UserId, i64)> {
        let mut rows: Vec<(UserId, i64)> = self
            .accounts
            .values()
            .filter(|a| a.group == group)
            .map(|a| (a.user, a.balance))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.truncate(n);
        rows
    }

    /// Every account in a group, sorted by user.
    pub fn accounts_in(&self, group: GroupId) -> Vec<&Account> {
        let mut list: Vec<&Account> = self.accounts.values().filter(|a| a.group == group).collect();
        list.sort_by_key(|a| a.user);
        list
    }

    /// Number of accounts across all groups.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
