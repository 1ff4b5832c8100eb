//! Optional external context for assessment prompts.

use std::path::PathBuf;

use async_trait::async_trait;

use grantlens_shared::{Grant, GrantLensError, Result};

/// Supplies extra facts about a grant before its prompt is built.
///
/// Failures are recoverable: the assessment proceeds without context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Context text for `grant`.
    async fn context_for(&self, grant: &Grant) -> Result<String>;
}

/// The same text for every grant.
#[derive(Debug, Clone)]
pub struct StaticContext(pub String);

#[async_trait]
impl ContextProvider for StaticContext {
    async fn context_for(&self, _grant: &Grant) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Text read from a file on every request.
#[derive(Debug, Clone)]
pub struct FileContext {
    path: PathBuf,
}

impl FileContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContextProvider for FileContext {
    async fn context_for(&self, _grant: &Grant) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| GrantLensError::ContextProvider(format!("{}: {e}", self.path.display())))
    }
}
