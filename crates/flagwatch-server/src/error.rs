//! Error types for the API layer.
//!
//! [`ServiceError`] unifies all failure modes into a single enum that can
//! be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//!
//! Unknown series are rejected with 400 before any store access; upstream
//! fetch failures surface as 502 so callers can distinguish "our store
//! broke" from "the flag endpoint is down" and retry accordingly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flagwatch_core::ingest::IngestError;
use flagwatch_core::store::StoreError;
use flagwatch_types::UnknownSeriesError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The requested series is outside the closed enumeration.
    #[error(transparent)]
    UnknownSeries(#[from] UnknownSeriesError),

    /// A caller-initiated ingestion failed.
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// A read against the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::UnknownSeries(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Ingest(IngestError::Fetch(_)) => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::Ingest(IngestError::Store(_)) | Self::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
