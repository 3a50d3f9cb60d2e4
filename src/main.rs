//! EcoWatch - environmental telemetry dashboard with threshold alerts.
//!
//! # API Endpoints
//!
//! - `GET /` - Evaluate featured zones and return the dashboard view
//! - `GET /pin_zone/:zone_id` - Toggle a zone's featured flag
//! - `POST /add_zone` - Register a zone (form: name, lat, lon)
//! - `GET /delete_zone/:zone_id` - Remove a zone
//! - `GET /api/update` - Fresh readings for all zones
//! - `GET /api/alerts` - Recent alerts; `GET /api/alerts/:alert_id` - one alert
//! - `POST /api/chat` - Ask the assistant about recorded telemetry
//! - `GET /api/system/reset` - Factory reset
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ecowatch::api::{AppState, router};
use ecowatch::assistant::{Assistant, OpenAiChatClient};
use ecowatch::config::AppConfig;
use ecowatch::dashboard::Dashboard;
use ecowatch::evaluator::ThresholdEvaluator;
use ecowatch::sources::SyntheticSource;
use ecowatch::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ecowatch=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    info!(
        port = config.port,
        db_url = %config.database_url,
        model = %config.llm.model,
        "Starting EcoWatch server"
    );
    if config.llm.api_key.is_none() {
        warn!("No LLM API key configured; assistant replies will fall back");
    }

    // Initialize storage and seed default zones on first start
    let storage = Storage::new(&config.database_url).await?;
    storage.seed_default_zones().await?;
    info!("Database initialized");

    let dashboard = Dashboard::new(
        storage.clone(),
        ThresholdEvaluator::new(config.thresholds.clone()),
        Arc::new(SyntheticSource),
    )
    .with_policy(config.alert_policy);

    let generator = OpenAiChatClient::new(&config.llm)?;
    let assistant = Assistant::new(
        storage.clone(),
        Arc::new(generator),
        config.llm.model.clone(),
        config.llm.timeout,
    );

    let state = AppState {
        storage,
        dashboard,
        assistant,
    };
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "EcoWatch is listening");

    axum::serve(listener, app).await?;

    info!("EcoWatch shut down");
    Ok(())
}
