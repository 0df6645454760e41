//! The chat platform, as seen by the engine.
//!
//! Every call may suspend for an unbounded time. The engine never holds a
//! store lock across a [`Messenger`] call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parlor_core::{Chat, GroupId, MediaKind, MessageRef, UserId};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::action::Action;

/// Errors reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessengerError {
    /// The bot lacks the permission for this call.
    #[error("missing permission: {0}")]
    Forbidden(String),
    /// The recipient has blocked the bot.
    #[error("user {0} has blocked the bot")]
    Blocked(UserId),
    /// The message or member does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Convenience result type for messenger calls.
pub type MessengerResult<T> = Result<T, MessengerError>;

/// An inline button carrying a tagged action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Action dispatched when pressed.
    pub action: Action,
}

impl Button {
    /// Build a button.
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Outbound chat operations.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message with optional buttons.
    async fn send_message(
        &self,
        chat: Chat,
        text: &str,
        buttons: &[Button],
    ) -> MessengerResult<MessageRef>;

    /// Replace the text of a sent message.
    async fn edit_message(&self, message: MessageRef, text: &str) -> MessengerResult<()>;

    /// Delete a sent message.
    async fn delete_message(&self, message: MessageRef) -> MessengerResult<()>;

    /// Re-send a media artifact with a caption.
    async fn send_media(
        &self,
        chat: Chat,
        kind: MediaKind,
        reference: &str,
        caption: &str,
    ) -> MessengerResult<MessageRef>;

    /// Display name of a group member.
    async fn member_name(&self, group: GroupId, user: UserId) -> MessengerResult<String>;

    /// Administrators of a group.
    async fn chat_admins(&self, group: GroupId) -> MessengerResult<Vec<UserId>>;

    /// Stop a member from sending messages until `until`.
    async fn restrict_member(
        &self,
        group: GroupId,
        user: UserId,
        until: DateTime<Utc>,
    ) -> MessengerResult<()>;
}

/// One call observed by a [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Sent {
    /// A text message.
    Message {
        /// Resulting reference.
        message: MessageRef,
        /// Body.
        text: String,
        /// Button labels.
        buttons: Vec<String>,
    },
    /// An edit.
    Edit {
        /// Edited message.
        message: MessageRef,
        /// New body.
        text: String,
    },
    /// A deletion.
    Delete {
        /// Deleted message.
        message: MessageRef,
    },
    /// A media re-send.
    Media {
        /// Resulting reference.
        message: MessageRef,
        /// Media kind.
        kind: MediaKind,
        /// Platform reference.
        reference: String,
        /// Caption.
        caption: String,
    },
    /// A mute.
    Restrict {
        /// Group.
        group: GroupId,
        /// Muted user.
        user: UserId,
        /// Mute end.
        until: DateTime<Utc>,
    },
}

impl Sent {
    /// The chat this call targeted.
    pub fn chat(&self) -> Chat {
        match self {
            Sent::Message { message, .. }
            | Sent::Edit { message, .. }
            | Sent::Delete { message }
            | Sent::Media { message, .. } => message.chat,
            Sent::Restrict { group, .. } => Chat::Group(*group),
        }
    }
}

/// An in-memory messenger that records every call. Used by tests and by
/// offline replays.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    next_id: AtomicI64,
    log: Mutex<Vec<Sent>>,
    admins: HashMap<GroupId, Vec<UserId>>,
    names: HashMap<UserId, String>,
    blocked: HashSet<UserId>,
    fail_deletes: bool,
}

impl RecordingMessenger {
    /// Empty messenger with no admins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register group admins.
    pub fn with_admins(mut self, group: GroupId, admins: impl IntoIterator<Item = UserId>) -> Self {
        self.admins.entry(group).or_default().extend(admins);
        self
    }

    /// Register a display name.
    pub fn with_name(mut self, user: UserId, name: impl Into<String>) -> Self {
        self.names.insert(user, name.into());
        self
    }

    /// Make private messages to `user` fail as blocked.
    pub fn with_blocked(mut self, user: UserId) -> Self {
        self.blocked.insert(user);
        self
    }

    /// Make every delete fail with a permission error.
    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// Every recorded call, in order.
    pub async fn sent(&self) -> Vec<Sent> {
        self.log.lock().await.clone()
    }

    /// Texts of messages sent to `chat`, in order.
    pub async fn texts_to(&self, chat: Chat) -> Vec<String> {
        self.log
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Message { message, text, .. } if message.chat == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub async fn clear(&self) {
        self.log.lock().await.clear();
    }

    fn allocate(&self, chat: Chat) -> MessageRef {
        MessageRef {
            chat,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    fn check_blocked(&self, chat: Chat) -> MessengerResult<()> {
        match chat {
            Chat::Private(user) if self.blocked.contains(&user) => Err(MessengerError::Blocked(user)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat: Chat,
        text: &str,
        buttons: &[Button],
    ) -> MessengerResult<MessageRef> {
        self.check_blocked(chat)?;
        let message = self.allocate(chat);
        self.log.lock().await.push(Sent::Message {
            message,
            text: text.to_string(),
            buttons: buttons.iter().map(|b| b.label.clone()).collect(),
        });
        Ok(message)
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> MessengerResult<()> {
        self.log.lock().await.push(Sent::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> MessengerResult<()> {
        if self.fail_deletes {
            return Err(MessengerError::Forbidden("delete messages".into()));
        }
        self.log.lock().await.push(Sent::Delete { message });
        Ok(())
    }

    async fn send_media(
        &self,
        chat: Chat,
        kind: MediaKind,
        reference: &str,
        caption: &str,
    ) -> MessengerResult<MessageRef> {
        self.check_blocked(chat)?;
        let message = self.allocate(chat);
        self.log.lock().await.push(Sent::Media {
            message,
            kind,
            reference: reference.to_string(),
            caption: caption.to_string(),
        });
        Ok(message)
    }

    async fn member_name(&self, _group: GroupId, user: UserId) -> MessengerResult<String> {
        self.names
            .get(&user)
            .cloned()
            .ok_or_else(|| MessengerError::NotFound(format!("member {user}")))
    }

    async fn chat_admins(&self, group: GroupId) -> MessengerResult<Vec<UserId>> {
        Ok(self.admins.get(&group).cloned().unwrap_or_default())
    }

    async fn restrict_member(
        &self,
        group: GroupId,
        user: UserId,
        until: DateTime<Utc>,
    ) -> MessengerResult<()> {
        self.log
            .lock()
            .await
            .push(Sent::Restrict { group, user, until });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls() {
        let m = RecordingMessenger::new().with_blocked(UserId(9));
        let group = Chat::Group(GroupId(1));
        let first = m.send_message(group, "hello", &[]).await.unwrap();
        let second = m.send_message(group, "again", &[]).await.unwrap();
        assert_ne!(first.message_id, second.message_id);
        m.delete_message(first).await.unwrap();
        assert!(matches!(
            m.send_message(Chat::Private(UserId(9)), "hi", &[]).await,
            Err(MessengerError::Blocked(UserId(9)))
        ));
        assert_eq!(m.texts_to(group).await, vec!["hello", "again"]);
        assert_eq!(m.sent().await.len(), 3);
    }

    #[tokio::test]
    async fn failing_deletes() {
        let m = RecordingMessenger::new().with_failing_deletes();
        let msg = m.send_message(Chat::Group(GroupId(1)), "x", &[]).await.unwrap();
        assert!(m.delete_message(msg).await.is_err());
    }
}
