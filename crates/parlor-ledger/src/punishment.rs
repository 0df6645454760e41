//! Punishment thresholds configured per group.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// A punishment announced when a balance drops below `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PunishmentRule {
    /// Balance below which the punishment applies.
    pub threshold: i64,
    /// Announcement text; unique within a group.
    pub message: String,
}

impl PunishmentRule {
    /// Build a rule.
    pub fn new(threshold: i64, message: impl Into<String>) -> Self {
        Self {
            threshold,
            message: message.into(),
        }
    }
}

/// The punishment rules of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PunishmentRule>", into = "Vec<PunishmentRule>")]
pub struct PunishmentBook {
    rules: Vec<PunishmentRule>,
}

impl PunishmentBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book, rejecting duplicate messages.
    pub fn from_rules(rules: impl IntoIterator<Item = PunishmentRule>) -> LedgerResult<Self> {
        let mut book = Self::new();
        for rule in rules {
            book.add(rule)?;
        }
        Ok(book)
    }

    /// Add a rule. Messages must be unique.
    pub fn add(&mut self, rule: PunishmentRule) -> LedgerResult<()> {
        if self.rules.iter().any(|r| r.message == rule.message) {
            return Err(LedgerError::DuplicatePunishment(rule.message));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Remove the rule with `message`.
    pub fn remove(&mut self, message: &str) -> LedgerResult<PunishmentRule> {
        let idx = self
            .rules
            .iter()
            .position(|r| r.message == message)
            .ok_or_else(|| LedgerError::UnknownPunishment(message.to_string()))?;
        Ok(self.rules.remove(idx))
    }

    /// All rules, in insertion order.
    pub fn rules(&self) -> &[PunishmentRule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<Vec<PunishmentRule>> for PunishmentBook {
    type Error = LedgerError;

    fn try_from(rules: Vec<PunishmentRule>) -> Result<Self, Self::Error> {
        Self::from_rules(rules)
    }
}

impl From<PunishmentBook> for Vec<PunishmentRule> {
    fn from(book: PunishmentBook) -> Self {
        book.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_unique() {
        let mut book = PunishmentBook::new();
        book.add(PunishmentRule::new(0, "cold shower")).unwrap();
        assert_eq!(
            book.add(PunishmentRule::new(-50, "cold shower")),
            Err(LedgerError::DuplicatePunishment("cold shower".into()))
        );
        book.add(PunishmentRule::new(-50, "lines")).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn remove_rule() {
        let mut book =
            PunishmentBook::from_rules([PunishmentRule::new(0, "a"), PunishmentRule::new(5, "b")])
                .unwrap();
        assert_eq!(book.remove("a").unwrap().threshold, 0);
        assert!(book.remove("a").is_err());
        assert_eq!(book.rules(), &[PunishmentRule::new(5, "b")]);
    }

    #[test]
    fn book_is_a_plain_list_in_json() {
        let book: PunishmentBook =
            serde_json::from_str(r#"[{"threshold":10,"message":"x"}]"#).unwrap();
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn duplicate_messages_rejected_on_load() {
        let res: Result<PunishmentBook, _> = serde_json::from_str(
            r#"[{"threshold":10,"message":"x"},{"threshold":0,"message":"x"}]"#,
        );
        assert!(res.is_err());
    }
}
