use crate::config::settings::AppConfig;
use crate::infrastructure::library::memory::MemoryVideoStore;
use crate::infrastructure::library::postgres::PgVideoStore;
use crate::infrastructure::library::VideoStore;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub type DbPool = Pool<Postgres>;

pub async fn connect_to_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    // jobs write one row at a time
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("✅ Connected to PostgreSQL");
    Ok(pool)
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local store that
/// forgets everything on restart.
pub async fn open_video_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VideoStore>> {
    let Some(url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, video records are kept in memory only");
        return Ok(Arc::new(MemoryVideoStore::new()));
    };

    let pool = connect_to_db(url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let store = PgVideoStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("Failed to prepare videos table")?;
    Ok(Arc::new(store))
}
