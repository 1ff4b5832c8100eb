//! OpenAI-compatible chat-completions backend (OpenRouter by default).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use grantlens_shared::{GrantLensError, ModelConfig, Result};

use crate::backend::{Availability, ModelBackend, ModelSession, SessionParams};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("GrantLens/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    top_k: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Chat-completions backend. Available when an API key is configured.
pub struct OpenRouterBackend {
    config: ModelConfig,
    api_key: Option<String>,
}

impl OpenRouterBackend {
    /// Backend reading its key from `config.api_key_env` at use time.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            api_key: None,
        }
    }

    /// Backend with an explicit key, ignoring the environment.
    pub fn with_api_key(config: ModelConfig, api_key: impl Into<String>) -> Self {
        Self {
            config,
            api_key: Some(api_key.into()),
        }
    }

    fn resolve_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.config.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[async_trait]
impl ModelBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn availability(&self) -> Availability {
        match self.resolve_key() {
            Some(_) => Availability::Available,
            None => Availability::Unavailable(format!(
                "API key not found. Set the {} environment variable.",
                self.config.api_key_env
            )),
        }
    }

    async fn create(&self, params: &SessionParams) -> Result<Box<dyn ModelSession>> {
        let api_key = self.resolve_key().ok_or_else(|| {
            GrantLensError::BackendCreate(format!("{} is empty", self.config.api_key_env))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .map_err(|e| GrantLensError::BackendCreate(format!("failed to build HTTP client: {e}")))?;

        Ok(Box::new(ChatSession {
            client,
            endpoint: format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')),
            model: self.config.model.clone(),
            api_key,
            params: params.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct ChatSession {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    params: SessionParams,
    closed: AtomicBool,
}

#[async_trait]
impl ModelSession for ChatSession {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = text.len()))]
    async fn prompt(&self, text: &str) -> Result<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GrantLensError::BackendRequest("session was destroyed".into()));
        }

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.params.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.params.temperature,
            top_k: self.params.top_k,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GrantLensError::BackendRequest(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body: Option<serde_json::Value> = response.json().await.ok();
            let message = error_body
                .as_ref()
                .and_then(|v| v.pointer("/error/message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(GrantLensError::BackendRequest(format!("HTTP {status}: {message}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GrantLensError::BackendRequest(format!("invalid completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GrantLensError::BackendRequest("empty completion".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }

    async fn destroy(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
