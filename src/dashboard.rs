//! Dashboard orchestration.
//!
//! Each render or live-update poll is one self-contained pass: for every zone
//! in scope, take a sample, evaluate it, log an alert on breach, and collect
//! the reading. Steps run strictly in that order per zone.
//!
//! # Usage
//!
//! ```ignore
//! let dashboard = Dashboard::new(storage, evaluator, Arc::new(SyntheticSource));
//! let view = dashboard.render().await?;
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AlertPolicy;
use crate::error::Result;
use crate::evaluator::ThresholdEvaluator;
use crate::model::{Alert, MetricSample, Zone};
use crate::sources::MetricSource;
use crate::storage::Storage;

/// Alerts shown in the dashboard's history table.
pub const DASHBOARD_ALERTS: u32 = 15;

/// Alerts scanned when counting breached zones.
pub const BREACH_WINDOW: u32 = 100;

/// One featured zone with its latest reading.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneReading {
    pub info: Zone,
    pub metrics: MetricSample,
    /// Breach reason for this reading, if any.
    pub alert: Option<String>,
}

/// Everything the dashboard page shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub zones: Vec<Zone>,
    pub dashboard_zones: Vec<ZoneReading>,
    pub alerts: Vec<Alert>,
    pub total_zones: usize,
    /// Distinct zones among the last [`BREACH_WINDOW`] alerts; recomputed per call.
    pub breached_zones_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// One entry of a live-update poll.
#[derive(Debug, Clone, Serialize)]
pub struct LiveUpdate {
    pub zone: String,
    pub metrics: MetricSample,
    pub alert: Option<String>,
}

/// Drives evaluation cycles over the zone registry.
#[derive(Clone)]
pub struct Dashboard {
    storage: Storage,
    evaluator: ThresholdEvaluator,
    source: Arc<dyn MetricSource>,
    policy: AlertPolicy,
}

impl Dashboard {
    pub fn new(
        storage: Storage,
        evaluator: ThresholdEvaluator,
        source: Arc<dyn MetricSource>,
    ) -> Self {
        Self {
            storage,
            evaluator,
            source,
            policy: AlertPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate the featured zones and gather the dashboard view.
    pub async fn render(&self) -> Result<DashboardView> {
        let zones = self.storage.list_zones().await?;
        let featured = self.storage.featured_zones().await?;

        let mut dashboard_zones = Vec::with_capacity(featured.len());
        for zone in featured {
            let (metrics, alert) = self.observe(&zone).await;
            dashboard_zones.push(ZoneReading {
                info: zone,
                metrics,
                alert,
            });
        }

        let alerts = self.storage.recent_alerts(DASHBOARD_ALERTS).await?;
        let breached_zones_count = self.storage.breached_zone_count(BREACH_WINDOW).await?;

        info!(
            total_zones = zones.len(),
            featured = dashboard_zones.len(),
            breached_zones_count,
            "Dashboard rendered"
        );

        Ok(DashboardView {
            total_zones: zones.len(),
            zones,
            dashboard_zones,
            alerts,
            breached_zones_count,
            notice: None,
        })
    }

    /// Evaluate every registered zone, featured or not.
    pub async fn live_update(&self) -> Result<Vec<LiveUpdate>> {
        let zones = self.storage.list_zones().await?;

        let mut updates = Vec::with_capacity(zones.len());
        for zone in zones {
            let (metrics, alert) = self.observe(&zone).await;
            updates.push(LiveUpdate {
                zone: zone.name,
                metrics,
                alert,
            });
        }

        debug!(zones = updates.len(), "Live update computed");
        Ok(updates)
    }

    /// Sample, evaluate, and log one zone.
    ///
    /// Logging failures are reported and swallowed; the reading and its
    /// reason are returned either way.
    pub async fn observe(&self, zone: &Zone) -> (MetricSample, Option<String>) {
        let metrics = self.source.sample();
        let reason = self.evaluator.evaluate(&metrics);

        if let Some(reason) = &reason {
            if let Err(e) = self.log_breach(zone, &metrics, reason).await {
                warn!(zone = %zone.name, error = %e, "Failed to log alert");
            }
        }

        (metrics, reason)
    }

    async fn log_breach(&self, zone: &Zone, metrics: &MetricSample, reason: &str) -> Result<()> {
        if let Some(cooldown) = self.policy.cooldown {
            if let Some(last) = self.storage.latest_alert_for_zone(&zone.name).await? {
                // Alerts stamped in the future count as fresh
                let age = (Utc::now() - last.timestamp).to_std().unwrap_or_default();
                if age < cooldown {
                    debug!(zone = %zone.name, alert_id = last.id, "Alert suppressed (cooldown)");
                    return Ok(());
                }
            }
        }

        self.storage.append_alert(&zone.name, metrics, reason).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ThresholdConfig, ThresholdProfile};
    use crate::sources::FixedSource;
    use std::time::Duration;

    fn baseline() -> ThresholdEvaluator {
        ThresholdEvaluator::new(ThresholdConfig::from_profile(ThresholdProfile::Baseline))
    }

    fn hot() -> MetricSample {
        MetricSample {
            temperature: 45.0,
            humidity: 50.0,
            wind_speed: 10.0,
            air_quality_index: 50,
            uv_index: 2.0,
            noise_level: 40.0,
        }
    }

    fn calm() -> MetricSample {
        MetricSample {
            temperature: 25.0,
            ..hot()
        }
    }

    async fn dashboard_with(sample: MetricSample) -> (Storage, Dashboard) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        storage.seed_default_zones().await.unwrap();
        let dashboard = Dashboard::new(storage.clone(), baseline(), Arc::new(FixedSource(sample)));
        (storage, dashboard)
    }

    #[tokio::test]
    async fn test_render_logs_one_alert_per_featured_zone() {
        let (storage, dashboard) = dashboard_with(hot()).await;

        let view = dashboard.render().await.unwrap();

        assert_eq!(view.total_zones, 10);
        assert_eq!(view.dashboard_zones.len(), 5);
        assert!(view.dashboard_zones.iter().all(|z| z.info.featured));
        assert!(
            view.dashboard_zones
                .iter()
                .all(|z| z.alert.as_deref() == Some("Extreme Heat"))
        );
        assert_eq!(view.alerts.len(), 5);
        assert_eq!(view.breached_zones_count, 5);
        assert_eq!(storage.recent_alerts(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_calm_render_logs_nothing() {
        let (storage, dashboard) = dashboard_with(calm()).await;

        let view = dashboard.render().await.unwrap();

        assert!(view.dashboard_zones.iter().all(|z| z.alert.is_none()));
        assert_eq!(view.breached_zones_count, 0);
        assert!(storage.recent_alerts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_update_covers_all_zones() {
        let (storage, dashboard) = dashboard_with(hot()).await;

        let updates = dashboard.live_update().await.unwrap();

        assert_eq!(updates.len(), 10);
        assert_eq!(updates[9].zone, "Surat Industrial");
        assert!(updates.iter().all(|u| u.alert.as_deref() == Some("Extreme Heat")));
        assert_eq!(storage.breached_zone_count(100).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_every_breach_is_logged_by_default() {
        let (storage, dashboard) = dashboard_with(hot()).await;

        dashboard.render().await.unwrap();
        dashboard.render().await.unwrap();

        assert_eq!(storage.recent_alerts(100).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeats() {
        let (storage, dashboard) = dashboard_with(hot()).await;
        let dashboard = dashboard.with_policy(AlertPolicy::with_cooldown(Duration::from_secs(3600)));

        let first = dashboard.render().await.unwrap();
        let second = dashboard.render().await.unwrap();

        assert_eq!(storage.recent_alerts(100).await.unwrap().len(), 5);
        // Reason is still reported even when the log write is suppressed
        assert!(second.dashboard_zones.iter().all(|z| z.alert.is_some()));
        assert_eq!(first.breached_zones_count, second.breached_zones_count);
    }

    #[tokio::test]
    async fn test_render_with_no_zones() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let dashboard = Dashboard::new(storage, baseline(), Arc::new(FixedSource(hot())));

        let view = dashboard.render().await.unwrap();
        assert_eq!(view.total_zones, 0);
        assert!(view.dashboard_zones.is_empty());
    }
}
