//! Prompt context assembly for the assistant.
//!
//! The assembled context is built only from the alert log and the session's
//! conversation memory:
//!
//! 1. one system message: behaviour rules, an optional focus block for a
//!    selected alert, and the most recent alerts as `id | zone | reason` lines
//! 2. the session's recent messages, oldest first
//! 3. the new user message
//!
//! [`ContextAssembler::compose`] is pure; [`ContextAssembler::assemble`] does
//! the reads and then composes.

use std::fmt::Write;

use tracing::debug;

use crate::error::Result;
use crate::model::{Alert, ChatMessage, PromptMessage, Role};
use crate::storage::{DEFAULT_HISTORY_LIMIT, Storage};

/// Number of recent alerts listed in the history block.
pub const HISTORY_ALERTS: u32 = 5;

const BEHAVIOUR_RULES: &str = "\
You are EcoWatch AI, an environmental risk analyst for a telemetry dashboard.

Rules:
- Answer only from the telemetry and alert data given below. If the data does not cover the question, say so.
- When a focus alert is given, analyse that alert only.
- Keep every answer under 120 words.
- Format with simple Markdown: bold key values, short tables where useful.";

/// Builds the message list sent to the answer-generation backend.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    history_alerts: u32,
    history_messages: u32,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            history_alerts: HISTORY_ALERTS,
            history_messages: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ContextAssembler {
    pub fn new(history_alerts: u32, history_messages: u32) -> Self {
        Self {
            history_alerts,
            history_messages,
        }
    }

    /// Read alert and conversation state and compose the context.
    ///
    /// An unknown `focus_alert_id` is not an error; the focus block is left out.
    pub async fn assemble(
        &self,
        storage: &Storage,
        session_id: &str,
        query: &str,
        focus_alert_id: Option<i64>,
    ) -> Result<Vec<PromptMessage>> {
        let focus = match focus_alert_id {
            Some(id) => storage.alert_by_id(id).await?,
            None => None,
        };
        if focus_alert_id.is_some() && focus.is_none() {
            debug!(alert_id = ?focus_alert_id, "Focus alert not found; omitting focus block");
        }

        let recent = storage.recent_alerts(self.history_alerts).await?;
        let history = storage
            .chat_history(session_id, self.history_messages)
            .await?;

        Ok(self.compose(focus.as_ref(), &recent, &history, query))
    }

    /// Compose the context from already-loaded state.
    ///
    /// `recent` is expected newest first and `history` oldest first, as the
    /// storage queries return them.
    pub fn compose(
        &self,
        focus: Option<&Alert>,
        recent: &[Alert],
        history: &[ChatMessage],
        query: &str,
    ) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(PromptMessage::new(
            Role::System,
            system_prompt(focus, recent),
        ));
        messages.extend(history.iter().map(PromptMessage::from));
        messages.push(PromptMessage::new(Role::User, query));
        messages
    }
}

fn system_prompt(focus: Option<&Alert>, recent: &[Alert]) -> String {
    let mut prompt = String::from(BEHAVIOUR_RULES);
    prompt.push_str("\n\n");

    if let Some(alert) = focus {
        prompt.push_str(&focus_block(alert));
        prompt.push('\n');
    }

    prompt.push_str(&history_block(recent));
    prompt
}

fn focus_block(alert: &Alert) -> String {
    let m = &alert.metrics;
    let mut block = String::new();
    let _ = writeln!(block, "FOCUS ALERT #{}:", alert.id);
    let _ = writeln!(block, "- Zone: {}", alert.zone_name);
    let _ = writeln!(block, "- Breach: {}", alert.reason);
    let _ = writeln!(
        block,
        "- AQI: {}, Temperature: {:.1}°C, UV: {:.1}, Noise: {:.1} dB, Wind: {:.1} km/h, Humidity: {:.1}%",
        m.air_quality_index, m.temperature, m.uv_index, m.noise_level, m.wind_speed, m.humidity
    );
    let _ = writeln!(
        block,
        "- Recorded at: {}",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    block
}

fn history_block(recent: &[Alert]) -> String {
    let mut block = String::from("RECENT ALERTS (newest first):\n");
    if recent.is_empty() {
        block.push_str("(none recorded)\n");
    }
    for alert in recent {
        let _ = writeln!(block, "{} | {} | {}", alert.id, alert.zone_name, alert.reason);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricSample;
    use chrono::{TimeZone, Utc};

    fn alert(id: i64, zone: &str, reason: &str) -> Alert {
        Alert {
            id,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            zone_name: zone.to_string(),
            metrics: MetricSample {
                temperature: 44.5,
                humidity: 40.0,
                wind_speed: 12.0,
                air_quality_index: 290,
                uv_index: 6.0,
                noise_level: 70.0,
            },
            reason: reason.to_string(),
        }
    }

    fn message(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            session_id: "s1".to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_compose_layout() {
        let assembler = ContextAssembler::default();
        let recent = vec![alert(3, "Pune Smart City", "Noise Violation")];
        let history = vec![
            message(Role::User, "earlier question"),
            message(Role::Assistant, "earlier answer"),
        ];

        let messages = assembler.compose(None, &recent, &history, "what now?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], PromptMessage::new(Role::User, "earlier question"));
        assert_eq!(messages[2], PromptMessage::new(Role::Assistant, "earlier answer"));
        assert_eq!(messages[3], PromptMessage::new(Role::User, "what now?"));
    }

    #[test]
    fn test_focus_block_contains_zone_and_reason() {
        let assembler = ContextAssembler::default();
        let focus = alert(7, "Chennai Port", "Critical AQI, Extreme Heat");

        let messages = assembler.compose(Some(&focus), &[], &[], "explain");
        let system = &messages[0].content;

        assert!(system.contains("FOCUS ALERT #7"));
        assert!(system.contains("Chennai Port"));
        assert!(system.contains("Critical AQI, Extreme Heat"));
        assert!(system.contains("AQI: 290"));
        assert!(system.contains("2026-03-14 09:30:00"));
    }

    #[test]
    fn test_history_block_lines_newest_first() {
        let assembler = ContextAssembler::default();
        let recent = vec![
            alert(9, "Kolkata Hub", "High UV"),
            alert(8, "Delhi Tech Zone", "Extreme Heat"),
        ];

        let system = assembler.compose(None, &recent, &[], "q").remove(0).content;

        let first = system.find("9 | Kolkata Hub | High UV").unwrap();
        let second = system.find("8 | Delhi Tech Zone | Extreme Heat").unwrap();
        assert!(first < second);
        assert!(!system.contains("FOCUS ALERT"));
    }

    #[test]
    fn test_empty_alert_log() {
        let system = ContextAssembler::default()
            .compose(None, &[], &[], "q")
            .remove(0)
            .content;
        assert!(system.contains("(none recorded)"));
    }

    #[tokio::test]
    async fn test_assemble_with_unknown_focus_omits_block() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let sample = alert(0, "", "").metrics;
        storage
            .append_alert("Surat Industrial", &sample, "Critical AQI")
            .await
            .unwrap();

        let messages = ContextAssembler::default()
            .assemble(&storage, "s1", "status?", Some(404))
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert!(!messages[0].content.contains("FOCUS ALERT"));
        assert!(messages[0].content.contains("Surat Industrial | Critical AQI"));
    }

    #[tokio::test]
    async fn test_assemble_reads_focus_and_history() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let sample = alert(0, "", "").metrics;
        let logged = storage
            .append_alert("Jaipur North", &sample, "Extreme Heat")
            .await
            .unwrap();
        storage.append_message("s1", Role::User, "hi").await.unwrap();
        storage.append_message("s1", Role::Assistant, "hello").await.unwrap();
        storage.append_message("s2", Role::User, "elsewhere").await.unwrap();

        let messages = ContextAssembler::default()
            .assemble(&storage, "s1", "and now?", Some(logged.id))
            .await
            .unwrap();

        assert_eq!(messages.len(), 4);
        assert!(messages[0].content.contains("FOCUS ALERT"));
        assert!(messages[0].content.contains("Jaipur North"));
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "hello");
        assert_eq!(messages[3].content, "and now?");
    }

    #[tokio::test]
    async fn test_history_window_is_bounded() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        for i in 0..6 {
            storage
                .append_message("s1", Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let messages = ContextAssembler::new(5, 3)
            .assemble(&storage, "s1", "latest", None)
            .await
            .unwrap();

        let contents: Vec<&str> = messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "latest"]);
    }
}
