//! Pure snapshot comparison.
//!
//! [`diff`] is the heart of the service: it compares an incoming snapshot
//! to the prior recorded state and emits one event per changed flag. It
//! performs no I/O, which keeps every edge case testable without a
//! database or network.
//!
//! # Event semantics
//!
//! | Flag is...                       | Prior state empty? | Event          |
//! |----------------------------------|--------------------|----------------|
//! | only in incoming                 | yes                | `TrackingBegan`|
//! | only in incoming                 | no                 | `Created`      |
//! | in both, values differ           | --                 | `Updated`      |
//! | only in prior                    | --                 | `Removed`      |
//! | in both, values equal            | --                 | (none)         |
//!
//! `TrackingBegan` is tied to the first-ever ingestion for a series (an
//! entirely empty prior state), never to an individual flag's first
//! appearance. A flag that is removed and later reappears emits `Created`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use flagwatch_types::{HistoryEventType, NewEvent, Series, Snapshot};

/// The result of one diff run: events to append and the superseding state.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    /// Change events in ascending flag-name order, at most one per flag.
    pub events: Vec<NewEvent>,
    /// The incoming snapshot verbatim; replaces the prior state entirely.
    pub new_state: Snapshot,
}

impl DiffOutcome {
    /// True when the incoming snapshot matched the prior state exactly.
    ///
    /// A frequent, valid outcome -- most scheduled ingestions find nothing
    /// changed.
    pub fn is_unchanged(&self) -> bool {
        self.events.is_empty()
    }
}

/// Compare an incoming snapshot against the prior state for `series`.
///
/// All emitted events share the single instant `now`; within the run they
/// are ordered by flag name ascending, which together with the store's
/// append order makes output reproducible.
pub fn diff(series: Series, incoming: &Snapshot, prior: &Snapshot, now: DateTime<Utc>) -> DiffOutcome {
    let first_ingestion = prior.is_empty();

    // Both maps iterate in flag order, so the merged key set does too.
    let flags: BTreeSet<&String> = incoming.keys().chain(prior.keys()).collect();

    let mut events = Vec::new();
    for flag in flags {
        let change = match (incoming.get(flag), prior.get(flag)) {
            (Some(value), None) => {
                let event_type = if first_ingestion {
                    HistoryEventType::TrackingBegan
                } else {
                    HistoryEventType::Created
                };
                Some((event_type, Some(value.clone())))
            }
            (Some(new), Some(old)) if new != old => {
                Some((HistoryEventType::Updated, Some(new.clone())))
            }
            (None, Some(_)) => Some((HistoryEventType::Removed, None)),
            _ => None,
        };

        if let Some((event_type, value)) = change {
            events.push(NewEvent {
                series,
                flag: flag.clone(),
                event_type,
                value,
                time: now,
            });
        }
    }

    DiffOutcome {
        events,
        new_state: incoming.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, serde_json::Value)]) -> Snapshot {
        pairs
            .iter()
            .map(|(flag, value)| ((*flag).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn first_ever_snapshot_is_all_tracking_began() {
        let incoming = snapshot(&[("a", json!(1)), ("b", json!(2))]);
        let outcome = diff(Series::PcDesktopClient, &incoming, &Snapshot::new(), Utc::now());

        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| (e.flag.as_str(), e.event_type, e.value.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", HistoryEventType::TrackingBegan, Some(json!(1))),
                ("b", HistoryEventType::TrackingBegan, Some(json!(2))),
            ]
        );
        assert_eq!(outcome.new_state, incoming);
    }

    #[test]
    fn identical_snapshots_emit_nothing() {
        let state = snapshot(&[("a", json!("x")), ("b", json!(true))]);
        let outcome = diff(Series::AndroidApp, &state, &state, Utc::now());

        assert!(outcome.is_unchanged());
        assert_eq!(outcome.new_state, state);
    }

    #[test]
    fn mixed_changes_come_out_in_flag_order() {
        let prior = snapshot(&[("a", json!(1)), ("b", json!(2))]);
        let incoming = snapshot(&[("a", json!(5)), ("c", json!(3))]);
        let outcome = diff(Series::IosApp, &incoming, &prior, Utc::now());

        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| (e.flag.as_str(), e.event_type, e.value.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", HistoryEventType::Updated, Some(json!(5))),
                ("b", HistoryEventType::Removed, None),
                ("c", HistoryEventType::Created, Some(json!(3))),
            ]
        );
    }

    #[test]
    fn empty_snapshot_removes_every_tracked_flag() {
        let prior = snapshot(&[("a", json!(1)), ("b", json!(2))]);
        let outcome = diff(Series::StudioApp, &Snapshot::new(), &prior, Utc::now());

        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| (e.flag.as_str(), e.event_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", HistoryEventType::Removed),
                ("b", HistoryEventType::Removed),
            ]
        );
        assert!(outcome.new_state.is_empty());
    }

    #[test]
    fn reappearing_flag_is_created_not_tracking_began() {
        // The series has prior state, so a returning flag is an ordinary
        // creation even if it was tracked once before.
        let prior = snapshot(&[("keeper", json!(0))]);
        let incoming = snapshot(&[("keeper", json!(0)), ("returned", json!("v2"))]);
        let outcome = diff(Series::MacDesktopClient, &incoming, &prior, Utc::now());

        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| (e.flag.as_str(), e.event_type))
            .collect();
        assert_eq!(kinds, vec![("returned", HistoryEventType::Created)]);
    }

    #[test]
    fn deep_equality_spans_value_types() {
        // "1" (string) and 1 (number) are different values.
        let prior = snapshot(&[("a", json!("1"))]);
        let incoming = snapshot(&[("a", json!(1))]);
        let outcome = diff(Series::PcDesktopClient, &incoming, &prior, Utc::now());

        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn all_events_in_a_run_share_one_instant() {
        let now = Utc::now();
        let incoming = snapshot(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        let outcome = diff(Series::AndroidApp, &incoming, &Snapshot::new(), now);

        assert!(outcome.events.iter().all(|e| e.time == now));
    }

    #[test]
    fn empty_against_empty_is_a_no_op() {
        let outcome = diff(
            Series::StudioApp,
            &Snapshot::new(),
            &Snapshot::new(),
            Utc::now(),
        );
        assert!(outcome.is_unchanged());
        assert!(outcome.new_state.is_empty());
    }
}
