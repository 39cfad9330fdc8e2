//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/flags/{series}` | Current flags for a series (`?fresh=true` refreshes first) |
//! | `GET` | `/api/events` | History feed (`?series=`, `?flag=`) |
//!
//! Both API endpoints return bare JSON arrays, matching what the
//! dashboard consumes. The series path/query parameters are validated
//! against the closed enumeration before any store access.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use flagwatch_core::store::HistoryFilter;
use flagwatch_types::Series;

use crate::error::ServiceError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/flags/{series}` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct FlagsQuery {
    /// Run a blocking ingestion for the series before reading.
    #[serde(default)]
    pub fresh: bool,
}

/// Query parameters for the `GET /api/events` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct EventsQuery {
    /// Filter events by series.
    pub series: Option<String>,
    /// Filter events by flag name. Without `series` the name is matched
    /// across all series.
    pub flag: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing the API endpoints and tracked series.
pub async fn index() -> impl IntoResponse {
    let series_list: String = Series::ALL
        .iter()
        .map(|series| format!("<li><a href=\"/api/flags/{series}\">{series}</a></li>\n"))
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Flagwatch</title>
</head>
<body>
    <h1>Flagwatch</h1>
    <p>Flag change observer -- current values and change history per series.</p>
    <h2>Series</h2>
    <ul>
{series_list}    </ul>
    <h2>API</h2>
    <ul>
        <li><code>GET /api/flags/{{series}}?fresh=true|false</code></li>
        <li><code>GET /api/events?series=&amp;flag=</code></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/flags/{series} -- current flags
// ---------------------------------------------------------------------------

/// Return every tracked flag for a series with its value and last-change
/// time.
///
/// With `fresh=true` the handler first awaits a full ingestion run for
/// the series; the response then reflects the upstream state as of this
/// request. Without it, responses are stale by at most one scheduler
/// interval, which the `Cache-Control` header advertises.
pub async fn get_flags(
    State(state): State<Arc<AppState>>,
    Path(series_str): Path<String>,
    Query(params): Query<FlagsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let series = parse_series(&series_str)?;

    if params.fresh {
        let report = state.ingestor.ingest(series).await?;
        tracing::debug!(
            series = %series,
            events = report.events_emitted,
            "Fresh ingestion before read"
        );
    }

    let flags = state.store.current_flags(series).await?;

    let cache_control = format!("max-age={}", state.cache_max_age_secs);
    Ok(([(header::CACHE_CONTROL, cache_control)], Json(flags)))
}

// ---------------------------------------------------------------------------
// GET /api/events -- history feed
// ---------------------------------------------------------------------------

/// Return the history feed, newest first, capped at 100 rows.
///
/// Without a `series` filter, `TrackingBegan` events are excluded -- a
/// series' initial import is noise in a cross-series feed. With one,
/// they are included as part of that series' lifecycle.
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let filter = HistoryFilter {
        series: params.series.as_deref().map(parse_series).transpose()?,
        flag: params.flag,
    };

    let events = state.store.history(&filter).await?;
    Ok(Json(events))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a series name, rejecting anything outside the closed enumeration.
fn parse_series(s: &str) -> Result<Series, ServiceError> {
    Ok(s.parse::<Series>()?)
}
