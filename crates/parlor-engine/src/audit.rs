//! Record of media stakes, kept for admins.

use chrono::{DateTime, Utc};
use parlor_core::{GroupId, MediaKind, SessionId, UserId};
use serde::{Deserialize, Serialize};

/// One media stake submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Group the stake was made in.
    pub group: GroupId,
    /// Who staked it.
    pub user: UserId,
    /// Session it was staked on.
    pub session: SessionId,
    /// Media kind.
    pub kind: MediaKind,
    /// Platform reference.
    pub reference: String,
    /// When it was submitted.
    pub at: DateTime<Utc>,
}

/// Append-only list of media stakes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeAudit {
    entries: Vec<AuditEntry>,
}

impl StakeAudit {
    /// Append an entry.
    pub fn record(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    /// Entries for one user in one group, oldest first.
    pub fn for_user(&self, group: GroupId, user: UserId) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.group == group && e.user == user)
            .cloned()
            .collect()
    }

    /// Total entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_user_and_group() {
        let mut audit = StakeAudit::default();
        for (group, user) in [(1, 10), (1, 11), (2, 10), (1, 10)] {
            audit.record(AuditEntry {
                group: GroupId(group),
                user: UserId(user),
                session: SessionId::new(),
                kind: MediaKind::Photo,
                reference: format!("f-{group}-{user}"),
                at: DateTime::default(),
            });
        }
        assert_eq!(audit.len(), 4);
        assert_eq!(audit.for_user(GroupId(1), UserId(10)).len(), 2);
        assert!(audit.for_user(GroupId(3), UserId(10)).is_empty());
    }
}
