//! Backend selection and one-time fallback negotiation.
//!
//! A run selects its backend at the first remote-write attempt and sticks
//! with it. A mid-run `StorageError::Unavailable` from the native binding
//! permits exactly one switch to the subprocess fallback; the switch is
//! never reversed and never repeated. `OperationFailed` never triggers a
//! switch.
use crate::model::BackendKind;
use crate::storage::StorageBackend;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

enum SelectionState {
    Unselected,
    Selected {
        backend: Option<Arc<dyn StorageBackend>>,
        fell_back: bool,
    },
}

pub struct BackendSelector {
    native: Option<Arc<dyn StorageBackend>>,
    fallback: Arc<dyn StorageBackend>,
    // Serializes negotiation: concurrent callers await one in-flight health
    // check instead of each running their own.
    state: Mutex<SelectionState>,
}

impl BackendSelector {
    pub fn new(
        native: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            native,
            fallback,
            state: Mutex::new(SelectionState::Unselected),
        }
    }

    /// Resolve the backend for this run, negotiating on first call. Returns
    /// None when no backend is viable; remote persistence is then abandoned
    /// and local artifacts remain the source of truth.
    pub async fn select(&self) -> Option<Arc<dyn StorageBackend>> {
        let mut state = self.state.lock().await;
        if let SelectionState::Selected { backend, .. } = &*state {
            return backend.clone();
        }

        if let Some(native) = &self.native {
            if native.health_check().await {
                info!(backend = native.kind().as_str(), "selected native storage backend");
                *state = SelectionState::Selected {
                    backend: Some(native.clone()),
                    fell_back: false,
                };
                return Some(native.clone());
            }
            warn!("native storage backend unavailable, trying subprocess fallback");
        }

        if self.fallback.health_check().await {
            info!(
                backend = self.fallback.kind().as_str(),
                "selected fallback storage backend"
            );
            *state = SelectionState::Selected {
                backend: Some(self.fallback.clone()),
                fell_back: true,
            };
            return Some(self.fallback.clone());
        }

        warn!("no storage backend available, remote persistence abandoned");
        *state = SelectionState::Selected {
            backend: None,
            fell_back: true,
        };
        None
    }

    /// The selected backend reported `Unavailable` mid-run. Switch to the
    /// fallback if that option is still open, else abandon remote writes.
    pub async fn mark_unavailable(&self) -> Option<Arc<dyn StorageBackend>> {
        let mut state = self.state.lock().await;
        match &*state {
            SelectionState::Selected {
                fell_back: false, ..
            } => {
                if self.fallback.health_check().await {
                    warn!("native backend failed mid-run, switching to subprocess fallback");
                    *state = SelectionState::Selected {
                        backend: Some(self.fallback.clone()),
                        fell_back: true,
                    };
                    return Some(self.fallback.clone());
                }
                warn!("fallback backend also unavailable, abandoning remote writes");
                *state = SelectionState::Selected {
                    backend: None,
                    fell_back: true,
                };
                None
            }
            _ => {
                warn!("backend unavailable with no fallback left, abandoning remote writes");
                *state = SelectionState::Selected {
                    backend: None,
                    fell_back: true,
                };
                None
            }
        }
    }

    /// Which variant ended up serving the run.
    pub async fn selected_kind(&self) -> BackendKind {
        match &*self.state.lock().await {
            SelectionState::Selected {
                backend: Some(b), ..
            } => b.kind(),
            _ => BackendKind::None,
        }
    }
}
