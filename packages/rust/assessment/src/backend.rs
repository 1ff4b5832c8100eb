//! The generative backend capability and its sessions.

use async_trait::async_trait;

use grantlens_shared::Result;

/// Whether a backend can be used in the current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Sessions can be created.
    Available,
    /// The capability is absent; carries a human-readable reason.
    Unavailable(String),
}

/// Parameters fixed at session creation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    /// System instruction sent ahead of every prompt.
    pub system_instruction: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-k sampling.
    pub top_k: u32,
}

/// A generative text backend that can open sessions.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Pre-flight presence check. Must not perform session creation.
    fn availability(&self) -> Availability;

    /// Open a new session.
    async fn create(&self, params: &SessionParams) -> Result<Box<dyn ModelSession>>;
}

/// A live session on a [`ModelBackend`].
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Submit one prompt and return the response text.
    async fn prompt(&self, text: &str) -> Result<String>;

    /// Release the session. Further prompts must fail.
    async fn destroy(&self);
}
