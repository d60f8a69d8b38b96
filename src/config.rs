//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ConfigError;
use crate::flow::Step;

/// Which optional verification steps the consumer flow requires.
///
/// Owned by an external configuration source; read-only to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowConfig {
    pub requires_otp: bool,
    pub requires_camera: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            requires_otp: true,
            requires_camera: true,
        }
    }
}

/// Publishes `FlowConfig` reloads to every subscribed store.
pub struct FlowConfigSource {
    tx: watch::Sender<FlowConfig>,
}

impl FlowConfigSource {
    pub fn new(initial: FlowConfig) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Subscribe to the current config and all later reloads.
    pub fn subscribe(&self) -> watch::Receiver<FlowConfig> {
        self.tx.subscribe()
    }

    /// Current config.
    pub fn current(&self) -> FlowConfig {
        *self.tx.borrow()
    }

    /// Replace the config. Stores observe the change on their next query.
    pub fn reload(&self, config: FlowConfig) {
        let previous = self.tx.send_replace(config);
        if previous != config {
            tracing::info!(
                requires_otp = config.requires_otp,
                requires_camera = config.requires_camera,
                "Flow config reloaded"
            );
        }
    }
}

/// Process-level configuration for the `flow-progress` binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file holding persisted progress records.
    pub db_path: PathBuf,
    /// Port for the REST surface.
    pub port: u16,
    /// Name of the progress record served by the REST surface.
    pub store_name: String,
    /// Step a fresh or reset session starts on.
    pub default_step: Step,
    pub flow: FlowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/flow-progress.db"),
            port: 8080,
            store_name: "consumer-flow".to_string(),
            default_step: Step::default(),
            flow: FlowConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `FLOW_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("FLOW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let port = match lookup("FLOW_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "FLOW_PORT".to_string(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => defaults.port,
        };

        let store_name = lookup("FLOW_STORE_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.store_name);

        let default_step = match lookup("FLOW_DEFAULT_STEP") {
            Some(raw) => raw
                .trim()
                .parse::<Step>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "FLOW_DEFAULT_STEP".to_string(),
                    message: e.to_string(),
                })?,
            None => defaults.default_step,
        };

        let flow = FlowConfig {
            requires_otp: parse_bool(&lookup, "FLOW_REQUIRES_OTP", defaults.flow.requires_otp)?,
            requires_camera: parse_bool(
                &lookup,
                "FLOW_REQUIRES_CAMERA",
                defaults.flow.requires_camera,
            )?,
        };

        Ok(Self {
            db_path,
            port,
            store_name,
            default_step,
            flow,
        })
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {raw:?}"),
        }),
    }
}
