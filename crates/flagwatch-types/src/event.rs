//! History events, current-flag rows, and snapshot payloads.
//!
//! A [`Snapshot`] is the complete point-in-time mapping of flag names to
//! values for one series, exactly as retrieved from the upstream source.
//! Each diff run compares the incoming snapshot to the prior one and emits
//! [`NewEvent`]s; once persisted they come back out of the store as
//! [`HistoryEvent`]s with a database-assigned id.
//!
//! Flag values are opaque JSON (string, boolean, or number upstream) and
//! are compared by deep equality only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::series::Series;

/// A complete point-in-time mapping of flag names to values for one series.
///
/// `BTreeMap` keeps flags in name order, which makes diff output
/// deterministic without an explicit sort.
pub type Snapshot = BTreeMap<String, serde_json::Value>;

/// The lifecycle stage a history event records for a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum HistoryEventType {
    /// First-ever observation of a flag during the first ingestion for its
    /// series (no prior recorded state existed at all).
    TrackingBegan,
    /// A flag appeared in a snapshot for a series that already had state.
    Created,
    /// A tracked flag's value changed.
    Updated,
    /// A tracked flag disappeared from the snapshot.
    Removed,
}

impl HistoryEventType {
    /// Convert to the `PostgreSQL` enum string stored in the `history` table.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::TrackingBegan => "tracking_began",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }

    /// Parse the `PostgreSQL` enum string back into the variant.
    ///
    /// Returns `None` for strings outside the enum, which can only happen
    /// if the database schema and this crate disagree.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "tracking_began" => Some(Self::TrackingBegan),
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// A change event produced by a diff run, not yet persisted.
///
/// Carries no id; the `history` table assigns one on append. `value` is
/// the new value for `TrackingBegan`/`Created`/`Updated` and `None` for
/// `Removed`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// The series the event belongs to.
    pub series: Series,
    /// The flag the event is about.
    pub flag: String,
    /// The lifecycle stage recorded.
    pub event_type: HistoryEventType,
    /// The new value, absent for removals.
    pub value: Option<serde_json::Value>,
    /// Wall-clock instant the diff ran.
    pub time: DateTime<Utc>,
}

/// An immutable, persisted change event as served by the history feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HistoryEvent {
    /// Database-assigned append order id.
    pub id: i64,
    /// The series the event belongs to.
    pub series: Series,
    /// The flag the event is about.
    pub flag: String,
    /// The lifecycle stage recorded.
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    /// The new value, absent for removals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Wall-clock instant the diff ran.
    pub time: DateTime<Utc>,
}

/// A currently tracked flag with its value and last-change time.
///
/// `last_updated` is the time of the most recent history event for the
/// flag whose type is not [`HistoryEventType::TrackingBegan`]; it is
/// absent for flags that never changed since first tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CurrentFlag {
    /// The series the flag belongs to.
    pub series: Series,
    /// The flag name.
    pub flag: String,
    /// The current value as of the latest snapshot.
    pub current_value: serde_json::Value,
    /// Time of the newest non-initial event, if the flag ever changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
