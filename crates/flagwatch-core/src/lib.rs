//! Snapshot diffing and event-history engine for Flagwatch.
//!
//! Given a fresh snapshot of flag values for a series, this crate computes
//! the minimal set of change events against the last known state, hands
//! them to the store as a single atomic unit, and keeps at most one diff
//! in flight per series.
//!
//! # Architecture
//!
//! ```text
//! Ingestor (per-series guard)
//!     |
//!     +-- SnapshotSource::fetch ----> upstream flag endpoint (HTTP)
//!     +-- FlagStore::read_state ----> flag_state table (prior state)
//!     +-- diff ---------------------> pure comparison, zero I/O
//!     +-- FlagStore::apply_diff ----> flag_state + history, one transaction
//! ```
//!
//! The query side ([`FlagStore::current_flags`], [`FlagStore::history`])
//! reads from the same store independently of ingestion.
//!
//! # Modules
//!
//! - [`diff`] -- Pure snapshot comparison
//! - [`fetch`] -- Upstream snapshot retrieval collaborator
//! - [`store`] -- Persistence collaborator trait and errors
//! - [`ingest`] -- Ingestion orchestration and the refresh scheduler
//! - [`config`] -- Typed YAML configuration

pub mod config;
pub mod diff;
pub mod fetch;
pub mod ingest;
pub mod store;

// Re-export primary types for convenience.
pub use config::{ConfigError, ServiceConfig};
pub use diff::{diff, DiffOutcome};
pub use fetch::{FetchError, HttpSnapshotSource, SnapshotSource};
pub use ingest::{IngestError, IngestReport, Ingestor};
pub use store::{FlagStore, HistoryFilter, StoreError, HISTORY_PAGE_SIZE};
