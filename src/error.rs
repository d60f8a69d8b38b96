//! Error types for the flow progress engine.

use crate::flow::{FlowVariant, Step};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Flow engine errors.
///
/// The engine itself never raises these for access queries; they surface
/// from parsing caller-supplied tags and from the gated `try_advance` path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Unknown flow variant: {0}")]
    UnknownVariant(String),

    #[error("Step {step} is locked, missing: {}", format_steps(.missing))]
    StepLocked { step: Step, missing: Vec<Step> },

    #[error("Step {step} is unreachable under variant {}", format_variant(.variant))]
    StepUnreachable {
        step: Step,
        variant: Option<FlowVariant>,
    },
}

impl FlowError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownStep(_) => "UNKNOWN_STEP",
            Self::UnknownVariant(_) => "UNKNOWN_VARIANT",
            Self::StepLocked { .. } => "STEP_LOCKED",
            Self::StepUnreachable { .. } => "STEP_UNREACHABLE",
        }
    }
}

fn format_steps(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_variant(variant: &Option<FlowVariant>) -> String {
    match variant {
        Some(v) => v.to_string(),
        None => "unset".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_error_codes() {
        assert_eq!(FlowError::UnknownStep("x".into()).code(), "UNKNOWN_STEP");
        assert_eq!(FlowError::UnknownVariant("x".into()).code(), "UNKNOWN_VARIANT");
        assert_eq!(
            FlowError::StepLocked {
                step: Step::Camera,
                missing: vec![Step::Identity],
            }
            .code(),
            "STEP_LOCKED"
        );
    }

    #[test]
    fn locked_message_lists_missing_steps() {
        let err = FlowError::StepLocked {
            step: Step::MiniGames,
            missing: vec![Step::Otp, Step::Camera],
        };
        assert_eq!(
            err.to_string(),
            "Step mini-games is locked, missing: otp, camera"
        );
    }

    #[test]
    fn unreachable_message_names_variant() {
        let err = FlowError::StepUnreachable {
            step: Step::RewardDraw,
            variant: Some(FlowVariant::NoGames),
        };
        assert!(err.to_string().contains("no-games"));

        let unset = FlowError::StepUnreachable {
            step: Step::Completion,
            variant: None,
        };
        assert!(unset.to_string().contains("unset"));
    }
}
