//! Wagers attached to a two-player session.
//!
//! A stake is either a positive number of points or a reference to a media
//! artifact held by the chat platform. Stakes are staged on the session and
//! only touch the ledger at settlement.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::Content;
use crate::error::{CoreError, CoreResult};

/// The kind of media artifact that can be staked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A still image.
    Photo,
    /// A video clip.
    Video,
    /// A voice note.
    Voice,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Voice => write!(f, "voice message"),
        }
    }
}

/// A wager staged by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Stake {
    /// A number of points, always positive.
    Points {
        /// Points at risk.
        amount: i64,
    },
    /// A media artifact forwarded to the group if forfeited.
    Media {
        /// What kind of artifact this is.
        kind: MediaKind,
        /// Platform reference used to re-send the artifact.
        reference: String,
    },
}

impl Stake {
    /// Build a point stake, checking it against the submitter's balance.
    pub fn points(amount: i64, balance: i64) -> CoreResult<Self> {
        if amount <= 0 {
            return Err(CoreError::NonPositiveStake(amount));
        }
        if amount > balance {
            return Err(CoreError::InsufficientFunds {
                needed: amount,
                available: balance,
            });
        }
        Ok(Stake::Points { amount })
    }

    /// Build a media stake from inbound content.
    pub fn media(content: &Content) -> CoreResult<Self> {
        let (kind, reference) = content
            .as_media()
            .ok_or(CoreError::NotStakeable(content.kind()))?;
        if reference.trim().is_empty() {
            return Err(CoreError::EmptyReference);
        }
        Ok(Stake::Media {
            kind,
            reference: reference.to_string(),
        })
    }

    /// Point amount, if this is a point stake.
    pub fn amount(&self) -> Option<i64> {
        match self {
            Stake::Points { amount } => Some(*amount),
            Stake::Media { .. } => None,
        }
    }
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stake::Points { amount } => write!(f, "{amount} points"),
            Stake::Media { kind, .. } => write!(f, "a {kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_within_balance() {
        assert_eq!(Stake::points(30, 100), Ok(Stake::Points { amount: 30 }));
        assert_eq!(Stake::points(100, 100), Ok(Stake::Points { amount: 100 }));
    }

    #[test]
    fn points_rejects_non_positive() {
        assert_eq!(Stake::points(0, 100), Err(CoreError::NonPositiveStake(0)));
        assert_eq!(Stake::points(-5, 100), Err(CoreError::NonPositiveStake(-5)));
    }

    #[test]
    fn points_rejects_overdraft() {
        assert_eq!(
            Stake::points(101, 100),
            Err(CoreError::InsufficientFunds {
                needed: 101,
                available: 100
            })
        );
        assert!(Stake::points(1, -20).is_err());
    }

    #[test]
    fn media_from_photo() {
        let stake = Stake::media(&Content::photo("file-1")).unwrap();
        assert_eq!(
            stake,
            Stake::Media {
                kind: MediaKind::Photo,
                reference: "file-1".into()
            }
        );
        assert_eq!(stake.amount(), None);
    }

    #[test]
    fn media_rejects_text() {
        assert!(matches!(
            Stake::media(&Content::text("hi")),
            Err(CoreError::NotStakeable(_))
        ));
        assert_eq!(
            Stake::media(&Content::voice("  ")),
            Err(CoreError::EmptyReference)
        );
    }

    #[test]
    fn stake_json_is_tagged() {
        let json = serde_json::to_string(&Stake::Points { amount: 5 }).unwrap();
        assert_eq!(json, r#"{"type":"points","amount":5}"#);
    }
}
