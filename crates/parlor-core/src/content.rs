//! Content a user sends into a chat.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stake::MediaKind;

/// The kind of an inbound message, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Plain text.
    Text,
    /// A still image.
    Photo,
    /// A video clip.
    Video,
    /// A voice note.
    Voice,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Text => write!(f, "text"),
            ContentKind::Photo => write!(f, "photo"),
            ContentKind::Video => write!(f, "video"),
            ContentKind::Voice => write!(f, "voice message"),
        }
    }
}

/// A message as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Content {
    /// A text message.
    Text {
        /// Message body.
        body: String,
    },
    /// A photo attachment.
    Photo {
        /// Platform file reference.
        reference: String,
    },
    /// A video attachment.
    Video {
        /// Platform file reference.
        reference: String,
    },
    /// A voice note.
    Voice {
        /// Platform file reference.
        reference: String,
    },
}

impl Content {
    /// A text message.
    pub fn text(body: impl Into<String>) -> Self {
        Content::Text { body: body.into() }
    }

    /// A photo attachment.
    pub fn photo(reference: impl Into<String>) -> Self {
        Content::Photo {
            reference: reference.into(),
        }
    }

    /// A video attachment.
    pub fn video(reference: impl Into<String>) -> Self {
        Content::Video {
            reference: reference.into(),
        }
    }

    /// A voice note.
    pub fn voice(reference: impl Into<String>) -> Self {
        Content::Voice {
            reference: reference.into(),
        }
    }

    /// The kind of this content.
    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Text { .. } => ContentKind::Text,
            Content::Photo { .. } => ContentKind::Photo,
            Content::Video { .. } => ContentKind::Video,
            Content::Voice { .. } => ContentKind::Voice,
        }
    }

    /// The media kind and reference, if this content is a media attachment.
    pub fn as_media(&self) -> Option<(MediaKind, &str)> {
        match self {
            Content::Text { .. } => None,
            Content::Photo { reference } => Some((MediaKind::Photo, reference)),
            Content::Video { reference } => Some((MediaKind::Video, reference)),
            Content::Voice { reference } => Some((MediaKind::Voice, reference)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Content::text("x").kind(), ContentKind::Text);
        assert_eq!(Content::video("v").kind(), ContentKind::Video);
    }

    #[test]
    fn media_extraction() {
        assert_eq!(Content::text("x").as_media(), None);
        assert_eq!(
            Content::voice("abc").as_media(),
            Some((MediaKind::Voice, "abc"))
        );
    }

    #[test]
    fn content_json_is_tagged() {
        let c: Content = serde_json::from_str(r#"{"kind":"photo","reference":"f1"}"#).unwrap();
        assert_eq!(c, Content::photo("f1"));
    }
}
