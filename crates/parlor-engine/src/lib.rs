//! Session engine for Parlor.
//!
//! Runs wagered two-player games and truth-or-dare prompts inside group
//! chats. The engine owns the session stores, the lifecycle state machines,
//! stake settlement, and the inactivity scheduler; the chat platform is
//! reached only through the [`Messenger`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//! use parlor_core::{GroupId, UserId};
//! use parlor_engine::{Action, EngineBuilder, RecordingMessenger};
//!
//! # async fn demo() -> parlor_engine::EngineResult<()> {
//! let engine = EngineBuilder::new(Arc::new(RecordingMessenger::new())).build()?;
//! engine
//!     .handle(UserId(1), GroupId(-10), Action::Challenge { opponent: UserId(2), staked: true })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod messenger;
pub mod notice;
pub mod scheduler;
pub mod session;
pub mod settlement;
pub mod store;
pub mod tod;

pub use action::{Action, Reply};
pub use audit::{AuditEntry, StakeAudit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, GroupSettings, Settings};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use messenger::{Button, Messenger, MessengerError, RecordingMessenger, Sent};
pub use notice::{Dispatcher, Notice};
pub use scheduler::{GameSweep, Scheduler, SweepReport, TodSweep};
pub use session::{CancelReason, Resolution, Session, SessionStatus};
pub use settlement::{Settlement, Trophy, settle};
pub use store::{Backend, JsonFileBackend, MemoryBackend, Store, StoreError};
pub use tod::{PromptKind, TodSession, TodStatus};
