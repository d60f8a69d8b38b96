//! Progress record encoding and the background persistence writer.
//!
//! Records are stored in the settings table under scope
//! [`settings_keys::FLOW_SCOPE`] with the store name as key:
//!
//! ```json
//! { "completedSteps": ["identity"], "currentStep": "otp",
//!   "flowVariant": null, "spinAllowance": 0 }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::Database;

use super::progress::ProgressState;
use super::step::{FlowVariant, Step};

/// Settings keys used for flow persistence.
pub mod settings_keys {
    /// Settings scope (the `user_id` column) shared by all flow records.
    pub const FLOW_SCOPE: &str = "flow_progress";
}

/// Serialize `state` into its persisted record.
pub fn encode(state: &ProgressState) -> Value {
    json!({
        "completedSteps": state.completed_steps,
        "currentStep": state.current_step,
        "flowVariant": state.flow_variant,
        "spinAllowance": state.spin_allowance,
    })
}

/// Rebuild state from a persisted record.
///
/// Never fails. Anything unreadable falls back to the fresh-session value
/// for that field.
pub fn decode(record: &Value, default_step: Step) -> ProgressState {
    let Some(fields) = record.as_object() else {
        warn!("Progress record is not an object, starting fresh");
        return ProgressState::new(default_step);
    };

    let completed_steps: BTreeSet<Step> = match fields.get("completedSteps") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|tag| tag.parse().ok())
            .collect(),
        Some(other) => {
            warn!(found = %other, "completedSteps is not an array, discarding");
            BTreeSet::new()
        }
        None => BTreeSet::new(),
    };

    let current_step = fields
        .get("currentStep")
        .and_then(Value::as_str)
        .and_then(|tag| tag.parse().ok())
        .unwrap_or(default_step);

    let flow_variant: Option<FlowVariant> = fields
        .get("flowVariant")
        .and_then(Value::as_str)
        .and_then(|tag| tag.parse().ok());

    let spin_allowance = flow_variant.map(|v| v.spin_allowance()).unwrap_or(0);
    if let Some(stored) = fields.get("spinAllowance").and_then(Value::as_u64) {
        if stored != u64::from(spin_allowance) {
            warn!(
                stored,
                derived = spin_allowance,
                "Stored spin allowance disagrees with variant, using derived value"
            );
        }
    }

    ProgressState {
        completed_steps,
        current_step,
        flow_variant,
        spin_allowance,
    }
}

/// Load the record for `key`, or a fresh state if there is none.
///
/// Storage errors are logged and treated as a missing record so session
/// start is never blocked.
pub async fn load(db: &dyn Database, key: &str, default_step: Step) -> ProgressState {
    match db.get_setting(settings_keys::FLOW_SCOPE, key).await {
        Ok(Some(record)) => decode(&record, default_step),
        Ok(None) => ProgressState::new(default_step),
        Err(e) => {
            warn!(store = %key, error = %e, "Failed to load flow progress, starting fresh");
            ProgressState::new(default_step)
        }
    }
}

enum WriteCommand {
    Save { key: String, record: Value },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer task.
///
/// `save` never blocks; writes are applied in the order they were queued.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl Persister {
    /// Spawn the writer on the current tokio runtime.
    ///
    /// The task exits once every `Persister` clone is dropped.
    pub fn spawn(db: Arc<dyn Database>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(db, rx));
        Self { tx }
    }

    /// Queue `record` to be written under `key`.
    pub fn save(&self, key: &str, record: Value) {
        let cmd = WriteCommand::Save {
            key: key.to_string(),
            record,
        };
        if self.tx.send(cmd).is_err() {
            warn!(store = %key, "Persistence writer has stopped, dropping snapshot");
        }
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run_writer(db: Arc<dyn Database>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriteCommand::Save { key, record } => {
                match db
                    .set_setting(settings_keys::FLOW_SCOPE, &key, &record)
                    .await
                {
                    Ok(()) => debug!(store = %key, "Flow progress persisted"),
                    Err(e) => warn!(store = %key, error = %e, "Failed to persist flow progress"),
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Persistence writer stopped");
}
