use crate::config::Config;
use crate::error::AppError;
use crate::store::PgMessageStore;
use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::str::FromStr;

/// Build the Postgres pool with bounded connect and acquire waits
pub fn build_pool(database_url: &str, cfg: &Config) -> Result<Pool, AppError> {
    let mut pg_config = PgConfig::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid DATABASE_URL: {e}")))?;
    pg_config.connect_timeout(cfg.db_connect_timeout);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);

    Pool::builder(mgr)
        .max_size(cfg.db_max_connections)
        .runtime(Runtime::Tokio1)
        .create_timeout(Some(cfg.db_connect_timeout))
        .wait_timeout(Some(cfg.db_acquire_timeout))
        .build()
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))
}

/// Build the pool and make sure the messages schema exists
pub async fn init_store(database_url: &str, cfg: &Config) -> Result<PgMessageStore, AppError> {
    let store = PgMessageStore::new(build_pool(database_url, cfg)?);

    // Schema setup is the first round-trip; an unreachable server fails here
    match tokio::time::timeout(cfg.db_connect_timeout, store.ensure_schema()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(AppError::StartServer(format!("db schema: {e}"))),
        Err(_) => {
            tracing::error!(
                timeout_secs = cfg.db_connect_timeout.as_secs(),
                "database connection verification timeout"
            );
            return Err(AppError::StartServer("db connect timed out".into()));
        }
    }

    tracing::info!(
        max_connections = cfg.db_max_connections,
        connect_timeout_secs = cfg.db_connect_timeout.as_secs(),
        acquire_timeout_secs = cfg.db_acquire_timeout.as_secs(),
        "connected to Postgres"
    );
    Ok(store)
}
