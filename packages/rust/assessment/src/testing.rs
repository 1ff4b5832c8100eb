//! In-memory backend with counters for session lifecycle tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use grantlens_shared::{GrantLensError, Result};

use crate::backend::{Availability, ModelBackend, ModelSession, SessionParams};

pub(crate) fn default_params() -> SessionParams {
    SessionParams {
        system_instruction: "system".into(),
        temperature: 0.2,
        top_k: 3,
    }
}

/// Observable state shared by a [`MockBackend`] and its sessions.
#[derive(Default)]
pub(crate) struct Probe {
    pub creates: AtomicUsize,
    pub destroys: AtomicUsize,
    /// Number of upcoming prompts that should fail.
    pub failing_prompts: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub params: Mutex<Vec<SessionParams>>,
}

impl Probe {
    pub fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

pub(crate) struct MockBackend {
    available: bool,
    fail_create: bool,
    create_delay: Option<Duration>,
    probe: Arc<Probe>,
}

impl MockBackend {
    pub fn available() -> Self {
        Self {
            available: true,
            fail_create: false,
            create_delay: None,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::available()
        }
    }

    pub fn with_create_delay_ms(mut self, ms: u64) -> Self {
        self.create_delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn availability(&self) -> Availability {
        if self.available {
            Availability::Available
        } else {
            Availability::Unavailable("mock backend disabled".into())
        }
    }

    async fn create(&self, params: &SessionParams) -> Result<Box<dyn ModelSession>> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create {
            return Err(GrantLensError::BackendCreate("mock create failure".into()));
        }

        let id = self.probe.creates.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.params.lock().unwrap().push(params.clone());

        Ok(Box::new(MockSession {
            id,
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct MockSession {
    id: usize,
    probe: Arc<Probe>,
}

#[async_trait]
impl ModelSession for MockSession {
    async fn prompt(&self, text: &str) -> Result<String> {
        self.probe.prompts.lock().unwrap().push(text.to_string());

        let should_fail = self
            .probe
            .failing_prompts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(GrantLensError::BackendRequest("mock prompt failure".into()));
        }

        Ok(format!("assessment from session {}", self.id))
    }

    async fn destroy(&self) {
        self.probe.destroys.fetch_add(1, Ordering::SeqCst);
    }
}
