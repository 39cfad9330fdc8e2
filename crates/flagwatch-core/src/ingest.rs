//! Ingestion orchestration and the refresh scheduler.
//!
//! [`Ingestor::ingest`] is the single write path of the service: fetch a
//! snapshot, read the prior state, diff, and apply the outcome atomically.
//! A per-series mutex serializes the whole sequence so no two diff runs
//! for one series can interleave -- overlapping runs would both read the
//! same prior state and emit duplicate or conflicting events. A request
//! arriving while a run is in flight waits for the lock, then performs its
//! own diff against the freshly written state (usually a no-op). Distinct
//! series never contend.
//!
//! Both triggers share this path: caller-initiated refresh (the `fresh`
//! query parameter) and the interval scheduler ([`run_scheduler`]).

use std::sync::Arc;

use flagwatch_types::Series;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::diff::diff;
use crate::fetch::{FetchError, SnapshotSource};
use crate::store::{FlagStore, StoreError};

/// Errors that can occur during one ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Retrieving the snapshot from the upstream source failed. Stored
    /// state is untouched.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Reading prior state or applying the diff failed. The run has no
    /// partial effect.
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// The series that was ingested.
    pub series: Series,
    /// Number of change events the diff emitted (zero is common).
    pub events_emitted: usize,
}

/// One mutex per enumeration member.
///
/// A fixed field per series rather than a keyed map: the enumeration is
/// closed, so lookup is total and needs no fallible `get`.
struct SeriesLocks {
    pc_desktop: Mutex<()>,
    mac_desktop: Mutex<()>,
    android: Mutex<()>,
    ios: Mutex<()>,
    studio: Mutex<()>,
}

impl SeriesLocks {
    const fn new() -> Self {
        Self {
            pc_desktop: Mutex::const_new(()),
            mac_desktop: Mutex::const_new(()),
            android: Mutex::const_new(()),
            ios: Mutex::const_new(()),
            studio: Mutex::const_new(()),
        }
    }

    const fn slot(&self, series: Series) -> &Mutex<()> {
        match series {
            Series::PcDesktopClient => &self.pc_desktop,
            Series::MacDesktopClient => &self.mac_desktop,
            Series::AndroidApp => &self.android,
            Series::IosApp => &self.ios,
            Series::StudioApp => &self.studio,
        }
    }
}

/// Orchestrates snapshot ingestion for all series.
pub struct Ingestor {
    source: Arc<dyn SnapshotSource>,
    store: Arc<dyn FlagStore>,
    locks: SeriesLocks,
}

impl Ingestor {
    /// Create an ingestor over the given collaborators.
    pub fn new(source: Arc<dyn SnapshotSource>, store: Arc<dyn FlagStore>) -> Self {
        Self {
            source,
            store,
            locks: SeriesLocks::new(),
        }
    }

    /// Run one ingestion for `series`: fetch, diff, persist.
    ///
    /// Holds the series lock for the full fetch-read-diff-apply sequence.
    /// When the diff finds nothing changed, no write is issued at all.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Fetch`] if the upstream retrieval fails and
    /// [`IngestError::Store`] if persistence fails; in both cases stored
    /// state is exactly as it was before the call.
    pub async fn ingest(&self, series: Series) -> Result<IngestReport, IngestError> {
        let _guard = self.locks.slot(series).lock().await;

        let snapshot = self.source.fetch(series).await?;
        let prior = self.store.read_state(series).await?;

        let outcome = diff(series, &snapshot, &prior, chrono::Utc::now());

        if !outcome.is_unchanged() {
            self.store
                .apply_diff(series, &outcome.new_state, &outcome.events)
                .await?;
        }

        info!(
            series = %series,
            events = outcome.events.len(),
            flags = outcome.new_state.len(),
            "Ingestion complete"
        );

        Ok(IngestReport {
            series,
            events_emitted: outcome.events.len(),
        })
    }
}

/// Drive scheduled refresh cycles until the task is aborted.
///
/// Every `interval_secs` the scheduler ingests each series in turn. A
/// failed series is logged and skipped; the cycle and the loop continue.
/// With `on_start` set, the first cycle runs immediately.
pub async fn run_scheduler(ingestor: Arc<Ingestor>, config: IngestConfig) {
    let period = std::time::Duration::from_secs(config.interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    if !config.on_start {
        // Consume the immediate first tick so the first cycle waits a
        // full interval.
        ticker.tick().await;
    }

    info!(
        interval_secs = config.interval_secs,
        on_start = config.on_start,
        "Refresh scheduler started"
    );

    loop {
        ticker.tick().await;

        for series in Series::ALL {
            match ingestor.ingest(series).await {
                Ok(report) => {
                    if report.events_emitted > 0 {
                        info!(
                            series = %series,
                            events = report.events_emitted,
                            "Scheduled refresh recorded changes"
                        );
                    }
                }
                Err(e) => {
                    error!(series = %series, error = %e, "Scheduled refresh failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use flagwatch_types::{
        CurrentFlag, HistoryEvent, HistoryEventType, NewEvent, Snapshot,
    };
    use serde_json::json;

    use super::*;
    use crate::store::HistoryFilter;

    /// Scripted snapshot source: pops responses front to back, optionally
    /// sleeping inside each fetch to widen race windows.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Snapshot, FetchError>>>,
        delay_ms: u64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Snapshot, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                delay_ms: 0,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay_ms: u64) -> Self {
            self.delay_ms = delay_ms;
            self
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self, _series: Series) -> Result<Snapshot, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }

            let result = self.responses.lock().await.remove(0);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    /// Minimal in-memory [`FlagStore`] mirroring the persistence contract.
    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<BTreeMap<Series, Snapshot>>,
        events: Mutex<Vec<NewEvent>>,
    }

    #[async_trait]
    impl FlagStore for MemoryStore {
        async fn read_state(&self, series: Series) -> Result<Snapshot, StoreError> {
            Ok(self
                .state
                .lock()
                .await
                .get(&series)
                .cloned()
                .unwrap_or_default())
        }

        async fn apply_diff(
            &self,
            series: Series,
            new_state: &Snapshot,
            events: &[NewEvent],
        ) -> Result<(), StoreError> {
            self.state.lock().await.insert(series, new_state.clone());
            self.events.lock().await.extend_from_slice(events);
            Ok(())
        }

        async fn current_flags(&self, _series: Series) -> Result<Vec<CurrentFlag>, StoreError> {
            Ok(Vec::new())
        }

        async fn history(&self, _filter: &HistoryFilter) -> Result<Vec<HistoryEvent>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn snapshot(pairs: &[(&str, serde_json::Value)]) -> Snapshot {
        pairs
            .iter()
            .map(|(flag, value)| ((*flag).to_owned(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn first_ingestion_persists_state_and_events() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(snapshot(&[
            ("a", json!(1)),
            ("b", json!(2)),
        ]))]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = Ingestor::new(source, Arc::clone(&store) as Arc<dyn FlagStore>);

        let report = ingestor.ingest(Series::PcDesktopClient).await.unwrap();
        assert_eq!(report.events_emitted, 2);

        let events = store.events.lock().await;
        assert!(events
            .iter()
            .all(|e| e.event_type == HistoryEventType::TrackingBegan));

        let state = store.state.lock().await;
        assert_eq!(
            state.get(&Series::PcDesktopClient),
            Some(&snapshot(&[("a", json!(1)), ("b", json!(2))]))
        );
    }

    #[tokio::test]
    async fn unchanged_snapshot_issues_no_write() {
        let same = snapshot(&[("a", json!(1))]);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(same.clone()),
            Ok(same.clone()),
        ]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = Ingestor::new(source, Arc::clone(&store) as Arc<dyn FlagStore>);

        let first = ingestor.ingest(Series::AndroidApp).await.unwrap();
        let second = ingestor.ingest(Series::AndroidApp).await.unwrap();

        assert_eq!(first.events_emitted, 1);
        assert_eq!(second.events_emitted, 0);
        assert_eq!(store.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_state_untouched() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(snapshot(&[("a", json!(1))])),
            Err(FetchError::Malformed(String::from("not an object"))),
        ]));
        let store = Arc::new(MemoryStore::default());
        let ingestor = Ingestor::new(source, Arc::clone(&store) as Arc<dyn FlagStore>);

        ingestor.ingest(Series::StudioApp).await.unwrap();
        let result = ingestor.ingest(Series::StudioApp).await;

        assert!(matches!(result, Err(IngestError::Fetch(_))));
        assert_eq!(store.events.lock().await.len(), 1);
        assert_eq!(
            store.state.lock().await.get(&Series::StudioApp),
            Some(&snapshot(&[("a", json!(1))]))
        );
    }

    #[tokio::test]
    async fn concurrent_ingestions_of_one_series_are_serialized() {
        // Both requests target the same series with the same payload. If
        // the guard failed, both would read empty prior state and emit
        // duplicate TrackingBegan events.
        let same = snapshot(&[("a", json!(1)), ("b", json!(2))]);
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(same.clone()), Ok(same.clone())]).with_delay(30),
        );
        let store = Arc::new(MemoryStore::default());
        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&source) as Arc<dyn SnapshotSource>,
            Arc::clone(&store) as Arc<dyn FlagStore>,
        ));

        let a = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.ingest(Series::IosApp).await }
        });
        let b = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.ingest(Series::IosApp).await }
        });

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        // One run saw the changes; the other found an identical snapshot.
        let mut emitted = [a.events_emitted, b.events_emitted];
        emitted.sort_unstable();
        assert_eq!(emitted, [0, 2]);

        // No duplicate events, and the fetches never overlapped.
        assert_eq!(store.events.lock().await.len(), 2);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_series_ingest_in_parallel() {
        let source = Arc::new(
            ScriptedSource::new(vec![
                Ok(snapshot(&[("a", json!(1))])),
                Ok(snapshot(&[("b", json!(2))])),
            ])
            .with_delay(30),
        );
        let store = Arc::new(MemoryStore::default());
        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&source) as Arc<dyn SnapshotSource>,
            Arc::clone(&store) as Arc<dyn FlagStore>,
        ));

        let a = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.ingest(Series::PcDesktopClient).await }
        });
        let b = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.ingest(Series::MacDesktopClient).await }
        });

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 2);
    }
}
