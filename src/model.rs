//! Data models for EcoWatch.
//!
//! Every persisted entity is a fixed-shape record:
//!
//! - [`Zone`]: a monitored location, optionally featured on the dashboard
//! - [`Alert`]: an immutable record of one breaching evaluation cycle
//! - [`ChatMessage`]: one entry of a session's conversation log
//!
//! [`MetricSample`] is ephemeral; only the [`Alert`] derived from it is stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of zones that may be featured at once.
pub const FEATURED_CAPACITY: i64 = 5;

/// A monitored location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Store-assigned identifier.
    pub id: i64,

    /// Display name, e.g. "Chennai Port".
    pub name: String,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Whether the zone is pinned to the primary dashboard.
    pub featured: bool,
}

/// One observation of the six environmental metrics for a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Air temperature in °C.
    pub temperature: f64,

    /// Relative humidity in percent.
    pub humidity: f64,

    /// Wind speed in km/h.
    pub wind_speed: f64,

    /// Air quality index.
    pub air_quality_index: i32,

    /// UV index.
    pub uv_index: f64,

    /// Ambient noise in dB.
    pub noise_level: f64,
}

/// A persisted threshold breach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Monotonic identifier assigned by the alert log.
    pub id: i64,

    /// When the breach was logged (UTC).
    pub timestamp: DateTime<Utc>,

    /// Name of the zone the sample was taken for.
    pub zone_name: String,

    /// Snapshot of the breaching sample.
    pub metrics: MetricSample,

    /// Comma-joined breach labels in rule order, e.g. "Extreme Heat, Noise Violation".
    pub reason: String,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The operator asking questions.
    User,
    /// The answer-generation backend.
    Assistant,
    /// Instructions and grounding data.
    System,
}

impl Role {
    /// Wire/storage name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown chat role '{other}'")),
        }
    }
}

/// One stored entry in a session's conversation log.
///
/// Sessions have no record of their own: a session is simply the set of
/// messages sharing a `session_id`, so an empty history and an unknown
/// session look the same.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A role-tagged message as sent to the answer-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for PromptMessage {
    fn from(message: &ChatMessage) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Form body for POST /add_zone.
#[derive(Debug, Clone, Deserialize)]
pub struct AddZoneForm {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Request body for POST /api/chat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The operator's question; a missing query is treated as empty.
    #[serde(default)]
    pub query: String,

    /// Conversation key; numbers are accepted and stringified.
    #[serde(default = "default_session_id", deserialize_with = "session_key")]
    pub session_id: String,

    /// Alert to focus the answer on. Numeric strings are accepted; anything
    /// else is treated as no selection.
    #[serde(default, deserialize_with = "optional_alert_id")]
    pub selected_alert_id: Option<i64>,
}

/// Session used when the client does not send one.
pub const DEFAULT_SESSION_ID: &str = "default_user";

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseKey {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

fn session_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match LooseKey::deserialize(deserializer)? {
        LooseKey::Number(n) => n.to_string(),
        LooseKey::Text(s) if !s.trim().is_empty() => s,
        _ => default_session_id(),
    })
}

fn optional_alert_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match LooseKey::deserialize(deserializer)? {
        LooseKey::Number(n) => Some(n),
        LooseKey::Text(s) => s.trim().parse().ok(),
        LooseKey::Other(_) => None,
    })
}

/// Response body for POST /api/chat.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Query parameters for GET /.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Error flag set by a redirecting handler, e.g. "limit_reached".
    pub error: Option<String>,

    /// Informational flag, e.g. "system_reset_complete".
    pub msg: Option<String>,
}

/// Query parameters for GET /api/alerts.
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    /// Number of alerts to return (default: 15, capped at 100).
    #[serde(default = "default_alert_limit")]
    pub limit: u32,
}

fn default_alert_limit() -> u32 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"query": "status?"}"#).unwrap();
        assert_eq!(request.session_id, DEFAULT_SESSION_ID);
        assert_eq!(request.selected_alert_id, None);
    }

    #[test]
    fn test_chat_request_loose_keys() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"query": "q", "session_id": 17, "selected_alert_id": "4"}"#,
        )
        .unwrap();
        assert_eq!(request.session_id, "17");
        assert_eq!(request.selected_alert_id, Some(4));

        let request: ChatRequest = serde_json::from_str(
            r#"{"query": "q", "session_id": "ops-1", "selected_alert_id": null}"#,
        )
        .unwrap();
        assert_eq!(request.session_id, "ops-1");
        assert_eq!(request.selected_alert_id, None);

        let request: ChatRequest =
            serde_json::from_str(r#"{"query": "q", "selected_alert_id": "latest"}"#).unwrap();
        assert_eq!(request.selected_alert_id, None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let message = PromptMessage::new(Role::Assistant, "ok");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
    }
}
