//! Grant cancellation-impact assessments from a generative backend.
//!
//! [`Assessor::assess`] resolves optional context, builds the prompt, and
//! submits it on a shared session owned by a [`SessionManager`]. Any
//! failure while acquiring or using the session tears it down so the next
//! call starts clean; the error itself is returned unchanged.

pub mod backend;
pub mod context;
pub mod openrouter;
pub mod prompt;
pub mod report;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use grantlens_shared::{Grant, ModelConfig, Result};

pub use backend::{Availability, ModelBackend, ModelSession, SessionParams};
pub use context::{ContextProvider, FileContext, StaticContext};
pub use openrouter::OpenRouterBackend;
pub use prompt::{DEFAULT_DESCRIPTION_CAP, SYSTEM_INSTRUCTION, build_prompt};
pub use report::render_report;
pub use session::SessionManager;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Defaults applied to every assessment.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    /// Maximum description characters embedded in a prompt.
    pub description_cap: usize,
    /// Sampling temperature when a session is created.
    pub temperature: f32,
    /// Top-k sampling when a session is created.
    pub top_k: u32,
    /// System instruction for new sessions.
    pub system_instruction: String,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for AssessmentConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            description_cap: config.description_cap,
            temperature: config.temperature,
            top_k: config.top_k,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Per-call options for [`Assessor::assess`].
#[derive(Default, Clone, Copy)]
pub struct AssessOptions<'a> {
    /// Source of extra context; failures fall back to no context.
    pub context_provider: Option<&'a dyn ContextProvider>,
    /// Overrides [`AssessmentConfig::temperature`].
    pub temperature: Option<f32>,
    /// Overrides [`AssessmentConfig::top_k`].
    pub top_k: Option<u32>,
}

// ---------------------------------------------------------------------------
// Assessor
// ---------------------------------------------------------------------------

/// Produces impact assessments over a shared backend session.
pub struct Assessor {
    sessions: Arc<SessionManager>,
    config: AssessmentConfig,
}

impl Assessor {
    /// Assessor with its own session manager on `backend`.
    pub fn new(backend: Arc<dyn ModelBackend>, config: AssessmentConfig) -> Self {
        Self::with_sessions(Arc::new(SessionManager::new(backend)), config)
    }

    /// Assessor sharing an existing session manager.
    pub fn with_sessions(sessions: Arc<SessionManager>, config: AssessmentConfig) -> Self {
        Self { sessions, config }
    }

    /// The session manager in use.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Assess the impact of canceling `grant`.
    #[instrument(skip_all, fields(recipient = %grant.recipient, agency = %grant.agency))]
    pub async fn assess(&self, grant: &Grant, options: &AssessOptions<'_>) -> Result<String> {
        let extra_context = resolve_context(options.context_provider, grant).await;
        let prompt = build_prompt(grant, &extra_context, self.config.description_cap);

        let params = SessionParams {
            system_instruction: self.config.system_instruction.clone(),
            temperature: options.temperature.unwrap_or(self.config.temperature),
            top_k: options.top_k.unwrap_or(self.config.top_k),
        };

        let session = match self.sessions.get_or_create(&params).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "could not acquire model session");
                self.sessions.reset().await;
                return Err(e);
            }
        };

        match session.prompt(&prompt).await {
            Ok(text) => {
                info!(chars = text.len(), "assessment complete");
                Ok(text)
            }
            Err(e) => {
                warn!(error = %e, "model request failed, discarding session");
                self.sessions.discard(&session).await;
                Err(e)
            }
        }
    }

    /// Tear down the shared session; the next assessment opens a new one.
    pub async fn reset_session(&self) {
        self.sessions.reset().await;
    }
}

/// Context text from `provider`, or empty when there is none or it fails.
async fn resolve_context(provider: Option<&dyn ContextProvider>, grant: &Grant) -> String {
    let Some(provider) = provider else {
        return String::new();
    };

    match provider.context_for(grant).await {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "context provider failed, continuing without context");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use async_trait::async_trait;
    use grantlens_shared::GrantLensError;
    use std::sync::atomic::Ordering;

    struct FailingContext;

    #[async_trait]
    impl ContextProvider for FailingContext {
        async fn context_for(&self, _grant: &Grant) -> Result<String> {
            Err(GrantLensError::ContextProvider("lookup service down".into()))
        }
    }

    fn grant() -> Grant {
        Grant {
            date: "3/14/2025".into(),
            agency: "DOE".into(),
            recipient: "Acme Carbon".into(),
            value: 1000.0,
            savings: 500.0,
            link: String::new(),
            description: "pilot".into(),
        }
    }

    fn assessor(backend: MockBackend) -> Assessor {
        Assessor::new(Arc::new(backend), AssessmentConfig::default())
    }

    #[tokio::test]
    async fn assess_returns_text_and_reuses_session() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        let first = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();
        let second = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();

        assert_eq!(first, "assessment from session 1");
        assert_eq!(second, "assessment from session 1");
        assert_eq!(probe.creates.load(Ordering::SeqCst), 1);
        assert!(probe.last_prompt().contains("Acme Carbon"));
    }

    #[tokio::test]
    async fn submission_failure_resets_session() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();
        probe.failing_prompts.store(1, Ordering::SeqCst);

        let err = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap_err();
        assert!(matches!(err, GrantLensError::BackendRequest(ref m) if m == "mock prompt failure"));
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);
        assert!(!assessor.sessions().is_active().await);

        let text = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();
        assert_eq!(text, "assessment from session 2");
        assert_eq!(probe.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_backend_fails_fast() {
        let backend = MockBackend::unavailable();
        let probe = backend.probe();
        let assessor = assessor(backend);

        let err = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap_err();
        assert!(matches!(err, GrantLensError::BackendUnavailable(_)));
        assert_eq!(probe.creates.load(Ordering::SeqCst), 0);
        assert!(probe.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn creation_failure_is_surfaced_and_retried_next_call() {
        let backend = MockBackend::failing_create();
        let assessor = assessor(backend);

        let err = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap_err();
        assert!(matches!(err, GrantLensError::BackendCreate(_)));
        assert!(!assessor.sessions().is_active().await);

        let err = assessor.assess(&grant(), &AssessOptions::default()).await.unwrap_err();
        assert!(matches!(err, GrantLensError::BackendCreate(_)));
    }

    #[tokio::test]
    async fn failing_context_provider_is_not_fatal() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        let options = AssessOptions {
            context_provider: Some(&FailingContext),
            ..AssessOptions::default()
        };
        let text = assessor.assess(&grant(), &options).await.unwrap();

        assert_eq!(text, "assessment from session 1");
        assert!(probe.last_prompt().contains("ADDITIONAL CONTEXT:\nN/A\n"));
    }

    #[tokio::test]
    async fn context_is_embedded_in_prompt() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        let provider = StaticContext("Plant employs 340 people.".into());
        let options = AssessOptions {
            context_provider: Some(&provider),
            ..AssessOptions::default()
        };
        assessor.assess(&grant(), &options).await.unwrap();

        assert!(probe.last_prompt().contains("Plant employs 340 people."));
    }

    #[tokio::test]
    async fn sampling_overrides_apply_at_creation() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        let options = AssessOptions {
            temperature: Some(0.9),
            top_k: Some(40),
            ..AssessOptions::default()
        };
        assessor.assess(&grant(), &options).await.unwrap();
        assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();

        let params = probe.params.lock().unwrap();
        assert_eq!(params.len(), 1);
        assert!((params[0].temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(params[0].top_k, 40);
        assert_eq!(params[0].system_instruction, SYSTEM_INSTRUCTION);
    }

    #[tokio::test]
    async fn defaults_come_from_config() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();

        let params = probe.params.lock().unwrap();
        assert!((params[0].temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(params[0].top_k, 3);
    }

    #[tokio::test]
    async fn reset_session_forces_new_creation() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let assessor = assessor(backend);

        assessor.reset_session().await;
        assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();
        assessor.reset_session().await;
        assessor.assess(&grant(), &AssessOptions::default()).await.unwrap();

        assert_eq!(probe.creates.load(Ordering::SeqCst), 2);
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_assessments_share_one_session() {
        let backend = MockBackend::available().with_create_delay_ms(25);
        let probe = backend.probe();
        let assessor = Arc::new(assessor(backend));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let assessor = Arc::clone(&assessor);
            handles.push(tokio::spawn(async move {
                assessor.assess(&grant(), &AssessOptions::default()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(probe.creates.load(Ordering::SeqCst), 1);
    }
}
