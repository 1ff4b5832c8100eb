//! Shared, lazily created model session.
//!
//! Lifecycle: `Absent -> Creating -> Ready`, back to `Absent` on reset.
//! The slot mutex is held across creation, so concurrent callers wait for
//! the one in-flight creation instead of opening their own sessions.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use grantlens_shared::{GrantLensError, Result};

use crate::backend::{Availability, ModelBackend, ModelSession, SessionParams};

/// Owns at most one session on a backend.
pub struct SessionManager {
    backend: Arc<dyn ModelBackend>,
    slot: Mutex<Option<Arc<dyn ModelSession>>>,
}

impl SessionManager {
    /// Create a manager with no active session.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            slot: Mutex::new(None),
        }
    }

    /// The backend sessions are created on.
    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    /// Return the shared session, creating it if there is none.
    ///
    /// `params` only apply when a new session is created; a reused session
    /// keeps the parameters it was opened with. Fails with
    /// [`GrantLensError::BackendUnavailable`] before any creation attempt
    /// when the backend is absent.
    pub async fn get_or_create(&self, params: &SessionParams) -> Result<Arc<dyn ModelSession>> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            debug!("reusing model session");
            return Ok(Arc::clone(session));
        }

        if let Availability::Unavailable(reason) = self.backend.availability() {
            return Err(GrantLensError::BackendUnavailable(reason));
        }

        info!(
            backend = self.backend.name(),
            temperature = params.temperature,
            top_k = params.top_k,
            "creating model session"
        );
        let session: Arc<dyn ModelSession> = Arc::from(self.backend.create(params).await?);
        *slot = Some(Arc::clone(&session));

        Ok(session)
    }

    /// Tear down and forget the shared session. No-op when there is none.
    pub async fn reset(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(session) = taken {
            session.destroy().await;
            info!("model session reset");
        }
    }

    /// Tear down `session` if it is still the shared one.
    ///
    /// A caller whose request failed on an old session must not destroy a
    /// session another caller has opened since.
    pub async fn discard(&self, session: &Arc<dyn ModelSession>) {
        let taken = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, session) => slot.take(),
                _ => None,
            }
        };

        match taken {
            Some(stale) => {
                stale.destroy().await;
                info!("model session discarded after failure");
            }
            None => debug!("failed session already replaced, nothing to discard"),
        }
    }

    /// Whether a session is currently held.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, default_params};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn creates_once_and_reuses() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let manager = SessionManager::new(Arc::new(backend));

        let a = manager.get_or_create(&default_params()).await.unwrap();
        let b = manager.get_or_create(&default_params()).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(probe.creates.load(Ordering::SeqCst), 1);
        assert!(manager.is_active().await);
    }

    #[tokio::test]
    async fn unavailable_backend_fails_before_create() {
        let backend = MockBackend::unavailable();
        let probe = backend.probe();
        let manager = SessionManager::new(Arc::new(backend));

        let err = manager.get_or_create(&default_params()).await.err().unwrap();
        assert!(matches!(err, GrantLensError::BackendUnavailable(_)));
        assert_eq!(probe.creates.load(Ordering::SeqCst), 0);
        assert!(!manager.is_active().await);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let manager = SessionManager::new(Arc::new(backend));

        manager.reset().await;
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 0);

        manager.get_or_create(&default_params()).await.unwrap();
        manager.reset().await;
        manager.reset().await;
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);
        assert!(!manager.is_active().await);

        manager.get_or_create(&default_params()).await.unwrap();
        assert_eq!(probe.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn discard_leaves_newer_session_alone() {
        let backend = MockBackend::available();
        let probe = backend.probe();
        let manager = SessionManager::new(Arc::new(backend));

        let old = manager.get_or_create(&default_params()).await.unwrap();
        manager.reset().await;
        let fresh = manager.get_or_create(&default_params()).await.unwrap();

        manager.discard(&old).await;
        assert!(manager.is_active().await);
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);

        manager.discard(&fresh).await;
        assert!(!manager.is_active().await);
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_creation() {
        let backend = MockBackend::available().with_create_delay_ms(25);
        let probe = backend.probe();
        let manager = Arc::new(SessionManager::new(Arc::new(backend)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.get_or_create(&default_params()).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(probe.creates.load(Ordering::SeqCst), 1);
    }
}
