//! Points economy for Parlor.
//!
//! The [`PointsLedger`] holds one balance per (group, user). Every balance
//! change goes through [`PointsLedger::apply_delta`], which evaluates the
//! group's punishment thresholds and the negative-balance strike ladder
//! against the new balance before returning. The caller turns the returned
//! [`LedgerEffect`]s into notifications and mutes.

pub mod chance;
pub mod error;
pub mod ledger;
pub mod punishment;

pub use chance::{ChanceBook, ChanceOutcome};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Account, DeltaReport, LedgerEffect, PointsLedger, StrikePolicy};
pub use punishment::{PunishmentBook, PunishmentRule};
