// src/db/mod.rs

use anyhow::Context;
use sqlx::{Pool, Postgres};

use crate::config::Settings;
use crate::store::StoreResult;

pub async fn connect(settings: &Settings) -> anyhow::Result<Pool<Postgres>> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("connecting to PostgreSQL")?;

    tracing::info!(max_connections = settings.max_connections, "connected to PostgreSQL");
    Ok(pool)
}

pub async fn migrate(pool: &Pool<Postgres>) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}
