//! Shared application state for the API server.
//!
//! [`AppState`] holds the two collaborators every handler needs: the
//! store for reads and the ingestor for caller-initiated refreshes. Both
//! are behind `Arc`s and injected via Axum's `State` extractor.

use std::sync::Arc;

use flagwatch_core::ingest::Ingestor;
use flagwatch_core::store::FlagStore;

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Read access to flag state and history.
    pub store: Arc<dyn FlagStore>,
    /// Write path for `fresh=true` refreshes.
    pub ingestor: Arc<Ingestor>,
    /// `Cache-Control: max-age` for the current-flags response, matching
    /// the scheduled refresh interval (ingestion is the only mutator, so
    /// responses are stale by at most one interval).
    pub cache_max_age_secs: u64,
}

impl AppState {
    /// Create the application state.
    pub fn new(
        store: Arc<dyn FlagStore>,
        ingestor: Arc<Ingestor>,
        cache_max_age_secs: u64,
    ) -> Self {
        Self {
            store,
            ingestor,
            cache_max_age_secs,
        }
    }
}
