//! HTTP API server (Axum) for the Flagwatch service.
//!
//! Exposes the two read operations of the engine -- current flags per
//! series and the history feed -- plus the caller-initiated refresh
//! (`fresh=true`), over a small REST surface with CORS enabled for the
//! dashboard.
//!
//! # Modules
//!
//! - [`router`] -- Route table assembly
//! - [`handlers`] -- Endpoint handlers
//! - [`state`] -- Shared application state
//! - [`error`] -- HTTP error mapping
//! - [`server`] -- TCP bind and serve lifecycle

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
