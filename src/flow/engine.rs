//! FlowEngine — builds progress stores and wires them to storage.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::FlowConfig;
use crate::error::DatabaseError;
use crate::store::Database;

use super::persistence::{self, Persister, settings_keys};
use super::progress::{ProgressState, ProgressStore};
use super::step::Step;

/// Shared context for every flow instance in the process.
///
/// Owns the storage handle, the config subscription and the background
/// persistence writer. Stores built from the same engine share the writer
/// but are otherwise independent; distinct names never collide.
#[derive(Clone)]
pub struct FlowEngine {
    db: Arc<dyn Database>,
    config: watch::Receiver<FlowConfig>,
    persister: Persister,
}

impl FlowEngine {
    /// Create an engine. Must be called from within a tokio runtime.
    pub fn new(db: Arc<dyn Database>, config: watch::Receiver<FlowConfig>) -> Self {
        let persister = Persister::spawn(Arc::clone(&db));
        Self {
            db,
            config,
            persister,
        }
    }

    /// A fresh session for `name`, ignoring any persisted record.
    ///
    /// Nothing is written until the first mutation.
    pub fn create_store(&self, default_step: Step, name: &str) -> ProgressStore {
        info!(store = %name, default_step = %default_step, "Progress store created");
        ProgressStore::new(
            name,
            default_step,
            ProgressState::new(default_step),
            self.config.clone(),
            Some(self.persister.clone()),
        )
    }

    /// Resume the session persisted under `name`, or start fresh.
    pub async fn resume_store(&self, default_step: Step, name: &str) -> ProgressStore {
        let state = persistence::load(self.db.as_ref(), name, default_step).await;
        info!(
            store = %name,
            current_step = %state.current_step,
            completed = state.completed_steps.len(),
            "Progress store resumed"
        );
        ProgressStore::new(
            name,
            default_step,
            state,
            self.config.clone(),
            Some(self.persister.clone()),
        )
    }

    /// Delete the persisted record for `name`. Returns whether one existed.
    ///
    /// Flushes queued writes first so a pending snapshot cannot resurrect it.
    pub async fn discard(&self, name: &str) -> Result<bool, DatabaseError> {
        self.persister.flush().await;
        let deleted = self
            .db
            .delete_setting(settings_keys::FLOW_SCOPE, name)
            .await?;
        if deleted {
            info!(store = %name, "Persisted progress discarded");
        }
        Ok(deleted)
    }

    /// Names of every store with a persisted record.
    pub async fn stored_names(&self) -> Result<Vec<String>, DatabaseError> {
        self.persister.flush().await;
        self.db.list_setting_keys(settings_keys::FLOW_SCOPE).await
    }

    /// Like [`stored_names`](Self::stored_names), but logs a storage failure
    /// and reports no sessions instead of failing startup.
    pub async fn persisted_sessions(&self) -> Vec<String> {
        match self.stored_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list persisted flow sessions");
                Vec::new()
            }
        }
    }

    /// Wait for every queued snapshot to reach storage.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}
