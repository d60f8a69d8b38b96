//! Progress store — the per-session flow state machine.
//!
//! Transitions are advisory: `set_current_step` moves the pointer without
//! consulting the dependency graph, and callers gate with
//! `can_access_step` first. `try_advance` does both in one call.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::FlowConfig;
use crate::error::FlowError;

use super::dependencies::{Requirement, dependencies, dependencies_for_tag};
use super::order::{position, step_order};
use super::persistence::{self, Persister};
use super::step::{FlowVariant, Step};

/// In-memory progress of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub completed_steps: BTreeSet<Step>,
    pub current_step: Step,
    pub flow_variant: Option<FlowVariant>,
    pub spin_allowance: u32,
}

impl ProgressState {
    /// Fresh session state starting on `default_step`.
    pub fn new(default_step: Step) -> Self {
        Self {
            completed_steps: BTreeSet::new(),
            current_step: default_step,
            flow_variant: None,
            spin_allowance: 0,
        }
    }
}

/// Progress of one named flow instance.
///
/// Built by [`FlowEngine`](super::FlowEngine); every mutation hands a
/// snapshot to the background persistence writer without waiting for it.
pub struct ProgressStore {
    name: String,
    default_step: Step,
    state: ProgressState,
    config: watch::Receiver<FlowConfig>,
    persister: Option<Persister>,
}

impl ProgressStore {
    pub(crate) fn new(
        name: impl Into<String>,
        default_step: Step,
        state: ProgressState,
        config: watch::Receiver<FlowConfig>,
        persister: Option<Persister>,
    ) -> Self {
        Self {
            name: name.into(),
            default_step,
            state,
            config,
            persister,
        }
    }

    /// A store that is never persisted. Useful for previews and tests.
    pub fn detached(default_step: Step, config: watch::Receiver<FlowConfig>) -> Self {
        Self::new(
            "detached",
            default_step,
            ProgressState::new(default_step),
            config,
            None,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_step(&self) -> Step {
        self.default_step
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn current_step(&self) -> Step {
        self.state.current_step
    }

    pub fn flow_variant(&self) -> Option<FlowVariant> {
        self.state.flow_variant
    }

    pub fn completed_steps(&self) -> &BTreeSet<Step> {
        &self.state.completed_steps
    }

    /// Whether the session sits on the terminal step.
    pub fn is_complete(&self) -> bool {
        self.state.current_step.is_terminal()
    }

    /// Config as of this call. Reloads are picked up immediately.
    pub fn config(&self) -> FlowConfig {
        *self.config.borrow()
    }

    /// Static display order for the current config.
    pub fn step_order(&self) -> Vec<Step> {
        step_order(&self.config())
    }

    /// Zero-based position of `step` in the display order, with its length.
    pub fn position(&self, step: Step) -> Option<(usize, usize)> {
        position(step, &self.config())
    }

    /// Requirement for `step` under the selected variant.
    pub fn dependencies(&self, step: Step) -> Requirement {
        dependencies(step, self.state.flow_variant, &self.config())
    }

    /// Whether every dependency of `step` is complete.
    pub fn can_access_step(&self, step: Step) -> bool {
        self.dependencies(step)
            .is_satisfied_by(&self.state.completed_steps)
    }

    /// `can_access_step` for a raw tag. Unrecognized tags are accessible.
    pub fn can_access_tag(&self, tag: &str) -> bool {
        dependencies_for_tag(tag, self.state.flow_variant, &self.config())
            .is_satisfied_by(&self.state.completed_steps)
    }

    /// Dependencies of `step` that are not complete yet.
    pub fn missing_steps(&self, step: Step) -> Vec<Step> {
        self.dependencies(step)
            .missing(&self.state.completed_steps)
    }

    /// Record `step` as complete. No-op if it already is.
    pub fn mark_step_complete(&mut self, step: Step) {
        if !self.state.completed_steps.insert(step) {
            return;
        }
        debug!(store = %self.name, step = %step, "Step completed");
        self.persist();
    }

    /// Move the current-step pointer. Does not check access.
    pub fn set_current_step(&mut self, step: Step) {
        debug!(
            store = %self.name,
            from = %self.state.current_step,
            to = %step,
            "Current step set"
        );
        self.state.current_step = step;
        self.persist();
    }

    /// Select the session variant and derive the spin allowance.
    ///
    /// Repeated calls overwrite the previous selection. Completed steps
    /// are left as they are.
    pub fn set_flow_variant(&mut self, variant: FlowVariant) {
        if let Some(previous) = self.state.flow_variant {
            if previous != variant {
                info!(
                    store = %self.name,
                    from = %previous,
                    to = %variant,
                    "Flow variant changed mid-session"
                );
            }
        }
        self.state.flow_variant = Some(variant);
        self.state.spin_allowance = variant.spin_allowance();
        debug!(
            store = %self.name,
            variant = %variant,
            spin_allowance = self.state.spin_allowance,
            "Flow variant set"
        );
        self.persist();
    }

    /// UI-facing name for [`set_flow_variant`](Self::set_flow_variant).
    pub fn set_survey_flow(&mut self, variant: FlowVariant) {
        self.set_flow_variant(variant);
    }

    /// Move to `step` only if it is accessible.
    ///
    /// Returns the step left behind. On rejection the state is untouched.
    pub fn try_advance(&mut self, step: Step) -> Result<Step, FlowError> {
        match self.dependencies(step) {
            Requirement::Unreachable => {
                debug!(store = %self.name, step = %step, "Advance rejected, step unreachable");
                Err(FlowError::StepUnreachable {
                    step,
                    variant: self.state.flow_variant,
                })
            }
            Requirement::Steps(required) => {
                let missing: Vec<Step> = required
                    .difference(&self.state.completed_steps)
                    .copied()
                    .collect();
                if !missing.is_empty() {
                    debug!(store = %self.name, step = %step, ?missing, "Advance rejected, step locked");
                    return Err(FlowError::StepLocked { step, missing });
                }
                let previous = self.state.current_step;
                self.set_current_step(step);
                Ok(previous)
            }
        }
    }

    /// Step after `step` in the static display order.
    ///
    /// Ignores the selected variant, so it may name a step the dependency
    /// graph rejects under `quick` or `no-games`.
    pub fn next_step(&self, step: Step) -> Option<Step> {
        let order = self.step_order();
        let index = order.iter().position(|s| *s == step)?;
        order.get(index + 1).copied()
    }

    /// Step before `step` in the static display order.
    pub fn previous_step(&self, step: Step) -> Option<Step> {
        let order = self.step_order();
        let index = order.iter().position(|s| *s == step)?;
        index.checked_sub(1).and_then(|i| order.get(i).copied())
    }

    /// Reward-draw attempts granted for this session.
    pub fn spin_count(&self) -> u32 {
        self.state.spin_allowance
    }

    /// Return to the default state of a fresh session.
    pub fn reset_progress(&mut self) {
        self.state = ProgressState::new(self.default_step);
        info!(store = %self.name, default_step = %self.default_step, "Progress reset");
        self.persist();
    }

    fn persist(&self) {
        if let Some(persister) = &self.persister {
            persister.save(&self.name, persistence::encode(&self.state));
        }
    }
}
