//! HTTP API handlers for EcoWatch.
//!
//! Management routes answer with `303 See Other` back to the dashboard, adding
//! an `error` flag when the action was refused (capacity reached, unknown
//! zone, invalid input). A refused action never turns into a server error.
//!
//! Chat content is never written to logs; only sizes and session ids are.

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::assistant::{Assistant, EMPTY_QUERY_REPLY};
use crate::dashboard::{Dashboard, DashboardView, LiveUpdate};
use crate::error::MonitorError;
use crate::model::{
    AddZoneForm, Alert, AlertsQuery, ChatRequest, ChatResponse, DashboardQuery,
};
use crate::storage::Storage;

/// Upper bound for GET /api/alerts?limit=.
const MAX_ALERT_PAGE: u32 = 100;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub dashboard: Dashboard,
    pub assistant: Assistant,
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/pin_zone/:zone_id", get(pin_zone))
        .route("/add_zone", post(add_zone))
        .route("/delete_zone/:zone_id", get(delete_zone))
        .route("/api/update", get(get_live_updates))
        .route("/api/alerts", get(get_recent_alerts))
        .route("/api/alerts/:alert_id", get(get_alert))
        .route("/api/chat", post(post_chat))
        .route("/api/system/reset", get(system_reset))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// GET / - Evaluate featured zones and return the dashboard view.
///
/// `error` / `msg` flags set by redirecting handlers are echoed as `notice`.
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, StatusCode> {
    match state.dashboard.render().await {
        Ok(mut view) => {
            view.notice = query.error.or(query.msg);
            Ok(Json(view))
        }
        Err(e) => {
            warn!(error = %e, "Failed to render dashboard");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /pin_zone/:zone_id - Toggle a zone's featured flag.
#[instrument(skip(state))]
pub async fn pin_zone(State(state): State<AppState>, Path(zone_id): Path<i64>) -> Redirect {
    match state.storage.toggle_zone(zone_id).await {
        Ok(true) => Redirect::to("/"),
        Ok(false) => Redirect::to("/?error=limit_reached"),
        Err(e) => redirect_for_error(zone_id, &e),
    }
}

/// POST /add_zone - Register a zone from form fields `name`, `lat`, `lon`.
#[instrument(skip(state))]
pub async fn add_zone(State(state): State<AppState>, Form(form): Form<AddZoneForm>) -> Redirect {
    match state.storage.register_zone(&form.name, form.lat, form.lon).await {
        Ok(_) => Redirect::to("/"),
        Err(MonitorError::Validation(reason)) => {
            info!(%reason, "Zone registration rejected");
            Redirect::to("/?error=invalid_zone")
        }
        Err(e) => {
            warn!(error = %e, "Failed to register zone");
            Redirect::to("/?error=storage_unavailable")
        }
    }
}

/// GET /delete_zone/:zone_id - Remove a zone.
#[instrument(skip(state))]
pub async fn delete_zone(State(state): State<AppState>, Path(zone_id): Path<i64>) -> Redirect {
    match state.storage.remove_zone(zone_id).await {
        Ok(()) => Redirect::to("/"),
        Err(e) => redirect_for_error(zone_id, &e),
    }
}

fn redirect_for_error(zone_id: i64, error: &MonitorError) -> Redirect {
    match error {
        MonitorError::NotFound { .. } => {
            info!(zone_id, "Zone not found");
            Redirect::to("/?error=zone_not_found")
        }
        e => {
            warn!(zone_id, error = %e, "Zone operation failed");
            Redirect::to("/?error=storage_unavailable")
        }
    }
}

/// GET /api/update - Fresh readings for every zone.
#[instrument(skip(state))]
pub async fn get_live_updates(
    State(state): State<AppState>,
) -> Result<Json<Vec<LiveUpdate>>, StatusCode> {
    state.dashboard.live_update().await.map(Json).map_err(|e| {
        warn!(error = %e, "Failed to compute live update");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /api/alerts - Most recent alerts, newest first.
///
/// # Query Parameters
///
/// - `limit` (optional): number of alerts (default: 15, max: 100)
#[instrument(skip(state))]
pub async fn get_recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<Alert>>, StatusCode> {
    let limit = query.limit.min(MAX_ALERT_PAGE);
    state.storage.recent_alerts(limit).await.map(Json).map_err(|e| {
        warn!(limit, error = %e, "Failed to query alerts");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /api/alerts/:alert_id - One alert, or 404.
#[instrument(skip(state))]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i64>,
) -> Result<Json<Alert>, StatusCode> {
    match state.storage.alert_by_id(alert_id).await {
        Ok(Some(alert)) => Ok(Json(alert)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(alert_id, error = %e, "Failed to fetch alert");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/chat - Ask the assistant about the recorded telemetry.
///
/// # Request Body
///
/// ```json
/// {
///     "query": "Why is Chennai Port flagged?",
///     "session_id": "ops-desk",
///     "selected_alert_id": 12
/// }
/// ```
///
/// `session_id` defaults to `default_user`; `selected_alert_id` is optional.
/// The reply is always `200 OK` with a `response` field: backend failures
/// yield a fallback message and unreadable bodies ask for a question.
#[instrument(skip(state, request))]
pub async fn post_chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            info!(error = %rejection, "Unreadable chat request");
            return Json(ChatResponse {
                response: EMPTY_QUERY_REPLY.to_string(),
            });
        }
    };

    let outcome = state
        .assistant
        .respond(
            &request.session_id,
            &request.query,
            request.selected_alert_id,
        )
        .await;

    Json(ChatResponse {
        response: outcome.reply,
    })
}

/// GET /api/system/reset - Factory reset: wipe all data and reseed default zones.
#[instrument(skip(state))]
pub async fn system_reset(State(state): State<AppState>) -> Redirect {
    match state.storage.reset_and_reseed().await {
        Ok(seeded) => {
            info!(seeded, "System reset via API");
            Redirect::to("/?msg=system_reset_complete")
        }
        Err(e) => {
            warn!(error = %e, "System reset failed");
            Redirect::to("/?error=reset_failed")
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
