//! Alert log: append-only breach history.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::info;

use super::{Storage, from_millis, now_millis};
use crate::error::Result;
use crate::model::{Alert, MetricSample};

const ALERT_COLUMNS: &str = "id, ts, zone_name, temp, humidity, wind, aqi, uv, noise, reason";

impl Storage {
    /// Record a breach for `zone_name` with the current time.
    pub async fn append_alert(
        &self,
        zone_name: &str,
        sample: &MetricSample,
        reason: &str,
    ) -> Result<Alert> {
        let (ts, timestamp) = now_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (ts, zone_name, temp, humidity, wind, aqi, uv, noise, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ts)
        .bind(zone_name)
        .bind(sample.temperature)
        .bind(sample.humidity)
        .bind(sample.wind_speed)
        .bind(sample.air_quality_index)
        .bind(sample.uv_index)
        .bind(sample.noise_level)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        let alert = Alert {
            id: result.last_insert_rowid(),
            timestamp,
            zone_name: zone_name.to_string(),
            metrics: *sample,
            reason: reason.to_string(),
        };

        info!(
            alert_id = alert.id,
            zone = %alert.zone_name,
            reason = %alert.reason,
            "Alert logged"
        );
        Ok(alert)
    }

    /// The `n` most recent alerts, newest first.
    pub async fn recent_alerts(&self, n: u32) -> Result<Vec<Alert>> {
        let rows = sqlx::query(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id DESC LIMIT ?"
        ))
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(alert_from_row).collect())
    }

    /// Look up one alert by id.
    pub async fn alert_by_id(&self, alert_id: i64) -> Result<Option<Alert>> {
        let row = sqlx::query(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?"))
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(alert_from_row))
    }

    /// Most recent alert logged for a zone, if any.
    pub async fn latest_alert_for_zone(&self, zone_name: &str) -> Result<Option<Alert>> {
        let row = sqlx::query(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE zone_name = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(zone_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(alert_from_row))
    }

    /// Number of distinct zones among the `window` most recent alerts.
    pub async fn breached_zone_count(&self, window: u32) -> Result<i64> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT zone_name)
            FROM (SELECT zone_name FROM alerts ORDER BY id DESC LIMIT ?)
            "#,
        )
        .bind(window)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

fn alert_from_row(row: &SqliteRow) -> Alert {
    Alert {
        id: row.get("id"),
        timestamp: from_millis(row.get("ts")),
        zone_name: row.get("zone_name"),
        metrics: MetricSample {
            temperature: row.get("temp"),
            humidity: row.get("humidity"),
            wind_speed: row.get("wind"),
            air_quality_index: row.get("aqi"),
            uv_index: row.get("uv"),
            noise_level: row.get("noise"),
        },
        reason: row.get("reason"),
    }
}
