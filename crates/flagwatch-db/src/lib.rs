//! `PostgreSQL` persistence layer for Flagwatch.
//!
//! Two tables back the whole service: `flag_state` (one mutable row per
//! series+flag holding the current value) and `history` (the append-only
//! change log). This crate owns the connection pool, the migrations, and
//! [`PgFlagStore`], the `PostgreSQL` implementation of the core's
//! [`FlagStore`](flagwatch_core::store::FlagStore) capability.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) to avoid requiring a live database at build time. All queries
//! are parameterized.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and configuration
//! - [`flag_store`] -- The `flag_state` + `history` store implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod flag_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::DbError;
pub use flag_store::PgFlagStore;
pub use postgres::{PostgresConfig, PostgresPool};
