//! Shared type definitions for the Flagwatch service.
//!
//! This crate is the single source of truth for the types used across the
//! Flagwatch workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`series`] -- The closed enumeration of tracked flag series
//! - [`event`] -- History events, current-flag rows, and snapshots

pub mod event;
pub mod series;

// Re-export all public types at crate root for convenience.
pub use event::{CurrentFlag, HistoryEvent, HistoryEventType, NewEvent, Snapshot};
pub use series::{Series, UnknownSeriesError};
