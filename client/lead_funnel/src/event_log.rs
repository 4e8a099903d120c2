//! Database layer — the local append-only analytics log.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::analytics::AnalyticsEvent;
use crate::errors::Result;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // Every connection to an in-memory database opens a fresh, empty one.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Analytics log ready at {url}");
    Ok(pool)
}

/// Append one event to the log.
pub async fn append_event(pool: &SqlitePool, event: &AnalyticsEvent) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    sqlx::query("INSERT INTO analytics_events (event, payload, created_at) VALUES (?1, ?2, ?3)")
        .bind(&event.event)
        .bind(payload)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(())
}

/// All cached events, oldest first. Rows that no longer decode are skipped.
pub async fn load_events(pool: &SqlitePool) -> Result<Vec<AnalyticsEvent>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, payload FROM analytics_events ORDER BY id ASC")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, payload)| match serde_json::from_str(&payload) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping undecodable analytics row {id}: {e}");
                None
            }
        })
        .collect())
}

/// Drop every cached event. Returns the number of rows removed.
pub async fn clear_events(pool: &SqlitePool) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM analytics_events")
        .execute(pool)
        .await?
        .rows_affected();
    Ok(removed)
}
