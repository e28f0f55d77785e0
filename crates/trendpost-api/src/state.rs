//! Shared application state: the session registry and the refinement stack.
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use trendpost_core::{ArtifactStore, RefinementOrchestrator, Session, SessionId};

use crate::metrics::Metrics;

pub type SharedSession = Arc<Mutex<Session>>;

/// Sessions keyed by id. Each session sits behind its own async mutex, so
/// refinements within one session run one at a time while other sessions
/// proceed independently.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> (SessionId, SharedSession) {
        let session = Session::new();
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, shared.clone());
        (id, shared)
    }

    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AppState {
    pub sessions: SessionRegistry,
    pub refiner: RefinementOrchestrator,
    pub artifacts: ArtifactStore,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        refiner: RefinementOrchestrator,
        artifacts: ArtifactStore,
    ) -> Result<Arc<Self>, prometheus::Error> {
        Ok(Arc::new(Self {
            sessions: SessionRegistry::new(),
            refiner,
            artifacts,
            metrics: Metrics::new()?,
        }))
    }
}
