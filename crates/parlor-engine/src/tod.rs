//! Truth-or-dare sessions.
//!
//! A subject asks for a truth or a dare, a prompt is drawn from the group's
//! pool, and the session waits for acceptance. Once accepted, only content
//! of the matching kind from the subject in the same group counts as proof.
//! Sessions are deleted when resolved.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use parlor_core::{Content, ContentKind, GroupId, MessageRef, SessionId, UserId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GroupSettings;
use crate::error::{EngineError, EngineResult};
use crate::store::Record;

/// Truth or dare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Answered in words.
    Truth,
    /// Proven with a picture or clip.
    Dare,
}

impl PromptKind {
    /// Whether `content` is valid proof for this kind.
    pub fn accepts(self, content: &Content) -> bool {
        match self {
            PromptKind::Truth => matches!(content.kind(), ContentKind::Text | ContentKind::Voice),
            PromptKind::Dare => matches!(content.kind(), ContentKind::Photo | ContentKind::Video),
        }
    }

    /// What the subject must send.
    pub fn proof_hint(self) -> &'static str {
        match self {
            PromptKind::Truth => "answer with a text or voice message",
            PromptKind::Dare => "send a photo or video as proof",
        }
    }

    /// The group's prompt pool for this kind.
    pub fn pool(self, settings: &GroupSettings) -> &[String] {
        match self {
            PromptKind::Truth => &settings.truths,
            PromptKind::Dare => &settings.dares,
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptKind::Truth => write!(f, "truth"),
            PromptKind::Dare => write!(f, "dare"),
        }
    }
}

/// Draw a prompt from a pool.
pub fn pick_prompt<'a>(pool: &'a [String], rng: &mut impl Rng) -> Option<&'a str> {
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.random_range(0..pool.len())].as_str())
}

/// Where a truth-or-dare session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodStatus {
    /// Waiting for the subject to accept or refuse.
    PendingAcceptance,
    /// Accepted; waiting for proof.
    AwaitingProof,
}

/// A single truth-or-dare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodSession {
    /// Identity.
    pub id: SessionId,
    /// Group it was asked in.
    pub group: GroupId,
    /// The subject.
    pub user: UserId,
    /// Truth or dare.
    pub kind: PromptKind,
    /// The drawn prompt.
    pub prompt: String,
    /// Lifecycle position.
    pub status: TodStatus,
    /// Last status change.
    pub timestamp: DateTime<Utc>,
    /// The prompt message, edited as the session progresses.
    pub message: Option<MessageRef>,
    /// Whether the inactivity warning went out.
    #[serde(default)]
    pub warning_sent: bool,
}

impl Record for TodSession {
    type Key = SessionId;

    fn key(&self) -> SessionId {
        self.id
    }
}

impl TodSession {
    /// Open a session awaiting acceptance.
    pub fn open(
        group: GroupId,
        user: UserId,
        kind: PromptKind,
        prompt: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            group,
            user,
            kind,
            prompt: prompt.into(),
            status: TodStatus::PendingAcceptance,
            timestamp: now,
            message: None,
            warning_sent: false,
        }
    }

    /// Reject anyone but the subject.
    pub fn ensure_subject(&self, actor: UserId) -> EngineResult<()> {
        if actor == self.user {
            Ok(())
        } else {
            Err(EngineError::Forbidden("this prompt is not yours".into()))
        }
    }

    /// Accept the prompt and start waiting for proof.
    pub fn accept(&mut self, actor: UserId, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_subject(actor)?;
        if self.status != TodStatus::PendingAcceptance {
            return Err(EngineError::Validation("this prompt was already accepted".into()));
        }
        self.status = TodStatus::AwaitingProof;
        self.timestamp = now;
        self.warning_sent = false;
        Ok(())
    }

    /// Check submitted proof.
    pub fn check_proof(&self, content: &Content) -> EngineResult<()> {
        if self.status != TodStatus::AwaitingProof {
            return Err(EngineError::Validation("accept the prompt before sending proof".into()));
        }
        if self.kind.accepts(content) {
            Ok(())
        } else {
            Err(EngineError::InvalidProof {
                required: self.kind,
            })
        }
    }

    /// Time since the last status change.
    pub fn idle(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.timestamp
    }
}
