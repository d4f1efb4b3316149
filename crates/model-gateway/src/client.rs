use std::time::Duration;

use async_trait::async_trait;

use crate::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::{ChatBackend, GatewayError, Result};

// ─── GatewayConfig ────────────────────────────────────────────────────────

/// Connection settings for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bearer token, if the backend requires one.
    pub api_key: Option<String>,
    /// Hard per-request timeout. The original driver had none; an unbounded
    /// model call can hang an entire build, so one is enforced here.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "gpt-oss:20b".to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

// ─── HttpGateway ──────────────────────────────────────────────────────────

/// Stateless chat client over an OpenAI-style `/chat/completions` endpoint.
pub struct HttpGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for HttpGateway {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: None,
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat request"
        );

        let mut req = self.http.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|source| GatewayError::Parse {
                body: body.clone(),
                source,
            })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)?;

        // Normalize here: downstream code only ever sees a plain string.
        Ok(choice
            .message
            .content
            .map(|c| c.into_text())
            .unwrap_or_default())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
