//! Assistant chat turns.
//!
//! Answer generation sits behind [`AnswerGenerator`] so the HTTP backend can
//! be swapped for [`CannedGenerator`] in tests. [`Assistant::respond`] runs
//! one turn end to end and never fails: a timeout, a transport error, or a
//! failed context read becomes [`FALLBACK_REPLY`]. A completed exchange is
//! stored as one unit or not at all.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::LlmConfig;
use crate::context::ContextAssembler;
use crate::error::{MonitorError, Result};
use crate::model::PromptMessage;
use crate::storage::Storage;

/// Reply shown when the backend cannot produce an answer.
pub const FALLBACK_REPLY: &str =
    "Sorry, the EcoWatch assistant is unavailable right now. Please try again in a moment.";

/// Reply for an empty question.
pub const EMPTY_QUERY_REPLY: &str = "Please enter a question about the monitored zones.";

/// Sampling temperature; kept low so answers stay close to the data.
const TEMPERATURE: f32 = 0.1;

/// Produces one reply for an ordered list of role-tagged messages.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, messages: &[PromptMessage], model: &str) -> Result<String>;
}

// ============================================================================
// OpenAI-compatible HTTP backend
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire format.
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    /// Build a client whose requests are bounded by `config.timeout`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChatClient {
    async fn generate(&self, messages: &[PromptMessage], model: &str) -> Result<String> {
        let request = CompletionRequest {
            model,
            messages,
            temperature: TEMPERATURE,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Transport(format!(
                "completion endpoint returned {status}: {body}"
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| MonitorError::Transport("completion contained no content".into()))
    }
}

// ============================================================================
// Canned backend
// ============================================================================

/// Deterministic generator for tests.
///
/// Remembers the last message list it was given so callers can inspect the
/// assembled context.
#[derive(Debug, Default)]
pub struct CannedGenerator {
    reply: Option<String>,
    delay: Option<Duration>,
    last: Mutex<Vec<PromptMessage>>,
}

impl CannedGenerator {
    /// Always answer with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Always fail with a transport error.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Answer with `reply` after sleeping for `delay`.
    pub fn slow(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Messages passed to the most recent `generate` call.
    pub fn last_messages(&self) -> Vec<PromptMessage> {
        self.last
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnswerGenerator for CannedGenerator {
    async fn generate(&self, messages: &[PromptMessage], _model: &str) -> Result<String> {
        if let Ok(mut last) = self.last.lock() {
            *last = messages.to_vec();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| MonitorError::Transport("canned generator configured to fail".into()))
    }
}

// ============================================================================
// Chat turn
// ============================================================================

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Text shown to the operator.
    pub reply: String,

    /// True when the fallback reply was substituted.
    pub degraded: bool,
}

/// Runs chat turns against the alert log and conversation memory.
#[derive(Clone)]
pub struct Assistant {
    storage: Storage,
    assembler: ContextAssembler,
    generator: Arc<dyn AnswerGenerator>,
    model: String,
    timeout: Duration,
}

impl Assistant {
    pub fn new(
        storage: Storage,
        generator: Arc<dyn AnswerGenerator>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            assembler: ContextAssembler::default(),
            generator,
            model: model.into(),
            timeout,
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Answer `query` for `session_id`, optionally focused on one alert.
    ///
    /// On success the question and the reply are appended to the session, in
    /// that order. On failure nothing is stored and the fallback is returned.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn respond(
        &self,
        session_id: &str,
        query: &str,
        focus_alert_id: Option<i64>,
    ) -> ChatOutcome {
        if query.trim().is_empty() {
            return ChatOutcome {
                reply: EMPTY_QUERY_REPLY.to_string(),
                degraded: false,
            };
        }

        let reply = match self.generate_reply(session_id, query, focus_alert_id).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id, error = %e, "Assistant turn degraded to fallback");
                return ChatOutcome {
                    reply: FALLBACK_REPLY.to_string(),
                    degraded: true,
                };
            }
        };

        if let Err(e) = self.remember(session_id, query, &reply).await {
            warn!(session_id, error = %e, "Failed to persist chat turn");
        }

        info!(session_id, reply_len = reply.len(), "Assistant replied");
        ChatOutcome {
            reply,
            degraded: false,
        }
    }

    async fn generate_reply(
        &self,
        session_id: &str,
        query: &str,
        focus_alert_id: Option<i64>,
    ) -> Result<String> {
        let messages = self
            .assembler
            .assemble(&self.storage, session_id, query, focus_alert_id)
            .await?;

        tokio::time::timeout(self.timeout, self.generator.generate(&messages, &self.model))
            .await
            .map_err(|_| {
                MonitorError::Transport(format!(
                    "answer generation timed out after {:?}",
                    self.timeout
                ))
            })?
    }

    async fn remember(&self, session_id: &str, query: &str, reply: &str) -> Result<()> {
        self.storage.append_exchange(session_id, query, reply).await?;
        Ok(())
    }
}
