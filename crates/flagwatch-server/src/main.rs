//! Flagwatch server binary.
//!
//! Wires together the configuration, the `PostgreSQL` store, the upstream
//! snapshot source, the ingestor, and the HTTP API.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `flagwatch-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Build the ingestor (HTTP snapshot source + store)
//! 5. Spawn the refresh scheduler on a background task
//! 6. Serve the HTTP API until terminated

use std::path::Path;
use std::sync::Arc;

use flagwatch_core::config::ServiceConfig;
use flagwatch_core::fetch::HttpSnapshotSource;
use flagwatch_core::ingest::{run_scheduler, Ingestor};
use flagwatch_core::store::FlagStore;
use flagwatch_db::{PgFlagStore, PostgresConfig, PostgresPool};
use flagwatch_server::server::{start_server, ServerConfig};
use flagwatch_server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default configuration file path, overridable via `FLAGWATCH_CONFIG`.
const DEFAULT_CONFIG_PATH: &str = "flagwatch-config.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path =
        std::env::var("FLAGWATCH_CONFIG").unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
    let config = if Path::new(&config_path).exists() {
        ServiceConfig::from_file(Path::new(&config_path))?
    } else {
        ServiceConfig::default()
    };

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!(config_path = config_path.as_str(), "flagwatch-server starting");
    info!(
        upstream = config.upstream.base_url.as_str(),
        interval_secs = config.ingest.interval_secs,
        on_start = config.ingest.on_start,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL and run migrations.
    let pg_config = PostgresConfig::new(&config.infrastructure.database_url)
        .with_max_connections(config.infrastructure.max_connections);
    let pool = PostgresPool::connect(&pg_config).await?;
    pool.run_migrations().await?;

    // 4. Build the ingestor.
    let store: Arc<dyn FlagStore> = Arc::new(PgFlagStore::new(pool.pool().clone()));
    let source = Arc::new(HttpSnapshotSource::new(&config.upstream)?);
    let ingestor = Arc::new(Ingestor::new(source, Arc::clone(&store)));

    // 5. Spawn the refresh scheduler.
    let scheduler_handle = tokio::spawn(run_scheduler(
        Arc::clone(&ingestor),
        config.ingest.clone(),
    ));
    info!("Refresh scheduler spawned on background task");

    // 6. Serve the HTTP API.
    let state = Arc::new(AppState::new(
        store,
        ingestor,
        config.ingest.interval_secs,
    ));
    let server_config = ServerConfig {
        host: config.infrastructure.server_host.clone(),
        port: config.infrastructure.server_port,
    };

    let result = start_server(&server_config, state).await;

    scheduler_handle.abort();
    pool.close().await;

    result?;
    Ok(())
}
