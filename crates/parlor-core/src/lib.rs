//! Core types for Parlor, a wagered mini-game engine for group chats.
//!
//! This crate defines the vocabulary shared by the rule modules, the points
//! ledger, and the session engine: chat identifiers, stakes, and the kinds of
//! content a user can send. It performs no I/O.

/// Inbound message content (text, photo, video, voice).
pub mod content;
/// Error types used throughout the crate.
pub mod error;
/// Chat, user, session, and message identifiers.
pub mod id;
/// Wagers attached to a session.
pub mod stake;

/// Re-export content types.
pub use content::{Content, ContentKind};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export identifier types.
pub use id::{Chat, GroupId, MessageRef, SessionId, UserId};
/// Re-export stake types.
pub use stake::{MediaKind, Stake};
