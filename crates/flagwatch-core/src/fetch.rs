//! Upstream snapshot retrieval.
//!
//! The flag endpoint serves a flat JSON object of flag name to value per
//! series; [`HttpSnapshotSource`] fetches and validates it over HTTP via
//! `reqwest`. The collaborator is a trait so the engine and its tests do
//! not depend on a live upstream.

use async_trait::async_trait;
use flagwatch_types::{Series, Snapshot};

use crate::config::UpstreamConfig;

/// Errors raised while retrieving a snapshot from the upstream source.
///
/// Fetch failures never mutate stored state; the previous diff's effects
/// remain valid until a future successful ingestion.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request itself failed (connect, timeout, TLS, ...).
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status {
        /// The HTTP status code received.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The payload was not a JSON object of flag name to value.
    #[error("malformed snapshot payload: {0}")]
    Malformed(String),
}

/// The raw snapshot retrieval collaborator.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Retrieve the complete current snapshot for `series`.
    async fn fetch(&self, series: Series) -> Result<Snapshot, FetchError>;
}

/// [`SnapshotSource`] backed by the upstream HTTP flag endpoint.
///
/// The final URL for a series is `{base_url}/{series}`.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    /// Build a client from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, series: Series) -> Result<Snapshot, FetchError> {
        let url = format!("{}/{series}", self.base_url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response.json().await?;

        let Some(object) = payload.as_object() else {
            return Err(FetchError::Malformed(format!(
                "expected a JSON object for {series}"
            )));
        };

        let snapshot: Snapshot = object
            .iter()
            .map(|(flag, value)| (flag.clone(), value.clone()))
            .collect();

        tracing::debug!(series = %series, flags = snapshot.len(), "Fetched snapshot");
        Ok(snapshot)
    }
}
