//! SQLite record store for EcoWatch.
//!
//! Three tables back the engine:
//!
//! - `zones`: monitored locations and their featured flag
//! - `alerts`: append-only breach history
//! - `chat_history`: per-session conversation log
//!
//! All ids come from `AUTOINCREMENT` columns, so they are monotonic and never
//! reused, even under concurrent appends. Timestamps are Unix milliseconds.
//!
//! Operations that read the featured count and then write (register, toggle,
//! reset) run in a single transaction while holding `zone_lock`, which keeps
//! the featured capacity from being overshot by interleaved callers.

mod alerts;
mod chat;
mod zones;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::model::FEATURED_CAPACITY;

pub use chat::DEFAULT_HISTORY_LIMIT;

/// Zones created on first start and after a factory reset, in insertion order.
pub const DEFAULT_ZONES: [(&str, f64, f64); 10] = [
    ("Mumbai Central", 18.96, 72.82),
    ("Delhi Tech Zone", 28.61, 77.20),
    ("Bangalore SEZ", 12.97, 77.59),
    ("Kolkata Hub", 22.57, 88.36),
    ("Chennai Port", 13.08, 80.27),
    ("Hyderabad Hitech", 17.38, 78.48),
    ("Pune Smart City", 18.52, 73.85),
    ("Ahmedabad West", 23.02, 72.57),
    ("Jaipur North", 26.91, 75.78),
    ("Surat Industrial", 21.17, 72.83),
];

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
    zone_lock: Arc<Mutex<()>>,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:ecowatch.db?mode=rwc" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory URL is a fresh database, so pin one.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;

        let storage = Self {
            pool,
            zone_lock: Arc::new(Mutex::new(())),
        };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS zones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                featured INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                zone_name TEXT NOT NULL,
                temp REAL NOT NULL,
                humidity REAL NOT NULL,
                wind REAL NOT NULL,
                aqi INTEGER NOT NULL,
                uv REAL NOT NULL,
                noise REAL NOT NULL,
                reason TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Per-session history lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_chat_history_session_ts
            ON chat_history(session_id, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert the default zones if the zone table is empty.
    ///
    /// Returns the number of zones inserted (0 when zones already exist).
    pub async fn seed_default_zones(&self) -> Result<usize> {
        let _guard = self.zone_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zones")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        let seeded = insert_default_zones(&mut *tx).await?;
        tx.commit().await?;

        info!(seeded, "Seeded default zones");
        Ok(seeded)
    }

    /// Wipe zones, alerts, and chat history, then reseed the default zones.
    ///
    /// Runs as one transaction: readers see either the old state or the
    /// freshly seeded one. Id sequences restart from 1.
    pub async fn reset_and_reseed(&self) -> Result<usize> {
        let _guard = self.zone_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for table in ["zones", "alerts", "chat_history"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "DELETE FROM sqlite_sequence WHERE name IN ('zones', 'alerts', 'chat_history')",
        )
        .execute(&mut *tx)
        .await?;

        let seeded = insert_default_zones(&mut *tx).await?;
        tx.commit().await?;

        info!(seeded, "Factory reset complete");
        Ok(seeded)
    }
}

async fn insert_default_zones(conn: &mut SqliteConnection) -> Result<usize> {
    for (name, lat, lon) in DEFAULT_ZONES {
        zones::insert_zone(conn, name, lat, lon).await?;
    }
    Ok(DEFAULT_ZONES.len())
}

async fn count_featured_on(conn: &mut SqliteConnection) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM zones WHERE featured = 1")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

fn has_capacity(featured: i64) -> bool {
    featured < FEATURED_CAPACITY
}

fn now_millis() -> (i64, DateTime<Utc>) {
    let ts = Utc::now().timestamp_millis();
    (ts, from_millis(ts))
}

fn from_millis(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_default()
}
