//! Persistence collaborator trait and errors.
//!
//! The core never talks to a database directly; it calls into a
//! [`FlagStore`], a capability covering both stores the design needs:
//! the mutable `flag_state` rows (latest value per series+flag) and the
//! append-only `history` event log. The `flagwatch-db` crate provides the
//! `PostgreSQL` implementation; tests substitute an in-memory one.

use async_trait::async_trait;
use flagwatch_types::{CurrentFlag, HistoryEvent, NewEvent, Series, Snapshot};

/// Fixed page size of the history feed, newest first.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Errors surfaced by a [`FlagStore`] implementation.
///
/// Any write-side error during a diff run aborts the whole run with no
/// partial effect; read-side errors surface to the query caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed or rejected an operation.
    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be converted back into domain types.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Filters for the history feed.
///
/// `flag` without `series` is allowed and scopes the flag name across all
/// series. When `series` is absent, `TrackingBegan` events are excluded:
/// the initial import of a series is noise in a cross-series feed, but
/// part of the lifecycle when one series is viewed on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Restrict the feed to one series.
    pub series: Option<Series>,
    /// Restrict the feed to one flag name.
    pub flag: Option<String>,
}

/// The persistence capability the engine calls into.
///
/// `apply_diff` must be atomic with respect to the readers: a reader may
/// observe the pre- or post-diff state of a series, but never new state
/// without its events or events without the state.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Read the full prior state for a series (empty map if never seen).
    async fn read_state(&self, series: Series) -> Result<Snapshot, StoreError>;

    /// Replace the series' state with `new_state` and append `events`,
    /// all or nothing.
    async fn apply_diff(
        &self,
        series: Series,
        new_state: &Snapshot,
        events: &[NewEvent],
    ) -> Result<(), StoreError>;

    /// Every tracked flag for a series in flag-name order, each with the
    /// time of its newest non-initial event (absent if never changed).
    async fn current_flags(&self, series: Series) -> Result<Vec<CurrentFlag>, StoreError>;

    /// The history feed: newest first, capped at [`HISTORY_PAGE_SIZE`].
    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEvent>, StoreError>;
}
