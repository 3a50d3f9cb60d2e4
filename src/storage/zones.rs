//! Zone registry: registration, featured toggle, removal.
//!
//! At most [`FEATURED_CAPACITY`] zones are featured at any time. Registration
//! features a new zone only while there is room; toggling a zone on fails
//! once the capacity is reached. Removing a featured zone leaves the gap open.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

use super::{Storage, count_featured_on, has_capacity};
use crate::error::{MonitorError, Result};
use crate::model::{FEATURED_CAPACITY, Zone};

impl Storage {
    /// Register a zone, featuring it if fewer than [`FEATURED_CAPACITY`] zones are featured.
    pub async fn register_zone(&self, name: &str, latitude: f64, longitude: f64) -> Result<Zone> {
        let name = validate_zone(name, latitude, longitude)?;

        let _guard = self.zone_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let zone = insert_zone(&mut *tx, name, latitude, longitude).await?;
        tx.commit().await?;

        info!(
            zone_id = zone.id,
            zone = %zone.name,
            featured = zone.featured,
            "Zone registered"
        );
        Ok(zone)
    }

    /// Flip a zone's featured flag.
    ///
    /// Returns `Ok(false)` without changing anything when the zone is not
    /// featured and the capacity is already used up. Unfeaturing always succeeds.
    pub async fn toggle_zone(&self, zone_id: i64) -> Result<bool> {
        match self.toggle_featured(zone_id).await {
            Ok(featured) => {
                info!(zone_id, featured, "Zone featured flag toggled");
                Ok(true)
            }
            Err(MonitorError::CapacityExceeded { capacity }) => {
                debug!(zone_id, capacity, "Featured capacity reached; toggle refused");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Toggle inside one locked transaction; returns the new flag value.
    async fn toggle_featured(&self, zone_id: i64) -> Result<bool> {
        let _guard = self.zone_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let current: Option<bool> = sqlx::query_scalar("SELECT featured FROM zones WHERE id = ?")
            .bind(zone_id)
            .fetch_optional(&mut *tx)
            .await?;

        let featured = current.ok_or(MonitorError::NotFound {
            entity: "zone",
            id: zone_id,
        })?;

        if !featured && !has_capacity(count_featured_on(&mut *tx).await?) {
            return Err(MonitorError::CapacityExceeded {
                capacity: FEATURED_CAPACITY,
            });
        }

        sqlx::query("UPDATE zones SET featured = ? WHERE id = ?")
            .bind(!featured)
            .bind(zone_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(!featured)
    }

    /// All zones, ordered by id.
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        let rows = sqlx::query("SELECT id, name, lat, lon, featured FROM zones ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(zone_from_row).collect())
    }

    /// Featured zones, ordered by id and capped at [`FEATURED_CAPACITY`].
    pub async fn featured_zones(&self) -> Result<Vec<Zone>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, lat, lon, featured
            FROM zones
            WHERE featured = 1
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(FEATURED_CAPACITY)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(zone_from_row).collect())
    }

    /// Look up a single zone.
    pub async fn zone(&self, zone_id: i64) -> Result<Option<Zone>> {
        let row = sqlx::query("SELECT id, name, lat, lon, featured FROM zones WHERE id = ?")
            .bind(zone_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(zone_from_row))
    }

    /// Number of currently featured zones.
    pub async fn count_featured(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        count_featured_on(&mut *conn).await
    }

    /// Delete a zone. Other zones keep their featured flags.
    pub async fn remove_zone(&self, zone_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM zones WHERE id = ?")
            .bind(zone_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MonitorError::NotFound {
                entity: "zone",
                id: zone_id,
            });
        }

        info!(zone_id, "Zone removed");
        Ok(())
    }
}

/// Insert a zone on an open connection, featuring it when capacity allows.
pub(super) async fn insert_zone(
    conn: &mut SqliteConnection,
    name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<Zone> {
    let featured = has_capacity(count_featured_on(conn).await?);

    let result = sqlx::query("INSERT INTO zones (name, lat, lon, featured) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .bind(featured)
        .execute(&mut *conn)
        .await?;

    Ok(Zone {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        latitude,
        longitude,
        featured,
    })
}

fn validate_zone(name: &str, latitude: f64, longitude: f64) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MonitorError::Validation("zone name must not be empty".into()));
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(MonitorError::Validation(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(MonitorError::Validation(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    Ok(name)
}

fn zone_from_row(row: &SqliteRow) -> Zone {
    Zone {
        id: row.get("id"),
        name: row.get("name"),
        latitude: row.get("lat"),
        longitude: row.get("lon"),
        featured: row.get("featured"),
    }
}
