//! The `flag_state` + `history` store implementation.
//!
//! [`PgFlagStore`] implements the core's
//! [`FlagStore`](flagwatch_core::store::FlagStore) capability over the two
//! tables. A diff run's writes -- replacing the series' state rows and
//! appending its events -- happen in one transaction, so readers see
//! either the pre-run or the post-run world, never half of one.
//!
//! Batch writes use multi-row `UNNEST` inserts: one round-trip per table
//! regardless of how many flags changed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flagwatch_core::store::{FlagStore, HistoryFilter, StoreError, HISTORY_PAGE_SIZE};
use flagwatch_types::{CurrentFlag, HistoryEvent, HistoryEventType, NewEvent, Series, Snapshot};
use sqlx::PgPool;

/// `PostgreSQL`-backed flag state and history store.
#[derive(Clone)]
pub struct PgFlagStore {
    pool: PgPool,
}

impl PgFlagStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlagStore for PgFlagStore {
    async fn read_state(&self, series: Series) -> Result<Snapshot, StoreError> {
        let rows = sqlx::query_as::<_, StateRow>(
            r"SELECT flag, value
              FROM flag_state
              WHERE series = $1",
        )
        .bind(series.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        Ok(rows.into_iter().map(|row| (row.flag, row.value)).collect())
    }

    async fn apply_diff(
        &self,
        series: Series,
        new_state: &Snapshot,
        events: &[NewEvent],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        // The incoming snapshot supersedes the prior state entirely.
        sqlx::query(r"DELETE FROM flag_state WHERE series = $1")
            .bind(series.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        if !new_state.is_empty() {
            let flags: Vec<String> = new_state.keys().cloned().collect();
            let values: Vec<serde_json::Value> = new_state.values().cloned().collect();

            sqlx::query(
                r"INSERT INTO flag_state (series, flag, value)
                  SELECT $1, f, v FROM UNNEST($2::TEXT[], $3::JSONB[]) AS u(f, v)",
            )
            .bind(series.as_str())
            .bind(&flags)
            .bind(&values)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        if !events.is_empty() {
            let len = events.len();
            let mut flags = Vec::with_capacity(len);
            let mut event_types = Vec::with_capacity(len);
            let mut values: Vec<Option<serde_json::Value>> = Vec::with_capacity(len);
            let mut times: Vec<DateTime<Utc>> = Vec::with_capacity(len);

            for event in events {
                flags.push(event.flag.clone());
                event_types.push(event.event_type.as_db_str().to_owned());
                values.push(event.value.clone());
                times.push(event.time);
            }

            // Multi-row INSERT using UNNEST; rows land in slice order, so
            // ids follow the diff's flag-name ordering.
            sqlx::query(
                r"INSERT INTO history (series, flag, event_type, value, time)
                  SELECT $1, f, t, v, ts
                  FROM UNNEST($2::TEXT[], $3::flag_event_type[], $4::JSONB[], $5::TIMESTAMPTZ[])
                       AS u(f, t, v, ts)",
            )
            .bind(series.as_str())
            .bind(&flags)
            .bind(&event_types)
            .bind(&values)
            .bind(&times)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;

        tracing::debug!(
            series = %series,
            flags = new_state.len(),
            events = events.len(),
            "Applied diff (single transaction)"
        );
        Ok(())
    }

    async fn current_flags(&self, series: Series) -> Result<Vec<CurrentFlag>, StoreError> {
        // Correlated top-1 lookup: newest event per flag excluding the
        // initial tracking_began import.
        let rows = sqlx::query_as::<_, CurrentFlagRow>(
            r"SELECT fs.series, fs.flag, fs.value,
                     (SELECT h.time
                        FROM history h
                       WHERE h.series = fs.series
                         AND h.flag = fs.flag
                         AND h.event_type <> 'tracking_began'
                       ORDER BY h.time DESC, h.id DESC
                       LIMIT 1) AS last_updated
              FROM flag_state fs
              WHERE fs.series = $1
              ORDER BY fs.flag",
        )
        .bind(series.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.into_iter().map(current_row_to_flag).collect()
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEvent>, StoreError> {
        let limit = i64::try_from(HISTORY_PAGE_SIZE).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, HistoryRow>(
            r"SELECT id, series, flag, event_type::TEXT AS event_type, value, time
              FROM history
              WHERE ($1::TEXT IS NULL OR series = $1)
                AND ($2::TEXT IS NULL OR flag = $2)
                AND ($1::TEXT IS NOT NULL OR event_type <> 'tracking_began')
              ORDER BY time DESC, id DESC
              LIMIT $3",
        )
        .bind(filter.series.map(Series::as_str))
        .bind(filter.flag.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.into_iter().map(history_row_to_event).collect()
    }
}

/// A row from the `flag_state` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct StateRow {
    /// The flag name.
    flag: String,
    /// The current value.
    value: serde_json::Value,
}

/// A `flag_state` row joined with its newest qualifying event time.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CurrentFlagRow {
    series: String,
    flag: String,
    value: serde_json::Value,
    last_updated: Option<DateTime<Utc>>,
}

/// A row from the `history` table.
///
/// Uses runtime types rather than compile-time checked types to avoid
/// requiring a live database during builds; `event_type` is cast from
/// the `PostgreSQL` enum to text in the query.
#[derive(Debug, Clone, sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    series: String,
    flag: String,
    event_type: String,
    value: Option<serde_json::Value>,
    time: DateTime<Utc>,
}

fn current_row_to_flag(row: CurrentFlagRow) -> Result<CurrentFlag, StoreError> {
    let series: Series = row
        .series
        .parse()
        .map_err(|e: flagwatch_types::UnknownSeriesError| StoreError::CorruptRow(e.to_string()))?;

    Ok(CurrentFlag {
        series,
        flag: row.flag,
        current_value: row.value,
        last_updated: row.last_updated,
    })
}

fn history_row_to_event(row: HistoryRow) -> Result<HistoryEvent, StoreError> {
    let series: Series = row
        .series
        .parse()
        .map_err(|e: flagwatch_types::UnknownSeriesError| StoreError::CorruptRow(e.to_string()))?;

    let event_type = HistoryEventType::from_db_str(&row.event_type).ok_or_else(|| {
        StoreError::CorruptRow(format!("unknown event type: {}", row.event_type))
    })?;

    Ok(HistoryEvent {
        id: row.id,
        series,
        flag: row.flag,
        event_type,
        value: row.value,
        time: row.time,
    })
}

/// Flatten a driver error into the core's store error.
fn db(err: sqlx::Error) -> StoreError {
    crate::error::DbError::Postgres(err).into()
}
