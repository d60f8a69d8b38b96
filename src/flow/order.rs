//! Linear step order used for progress-bar display.

use crate::config::FlowConfig;

use super::step::Step;

/// The maximal linear order of the consumer flow for `config`.
///
/// Optional verification steps appear only when enabled. The order never
/// encodes variant branching: survey, reward draw and completion are always
/// listed.
pub fn step_order(config: &FlowConfig) -> Vec<Step> {
    let mut order = vec![Step::Identity];
    if config.requires_otp {
        order.push(Step::Otp);
    }
    if config.requires_camera {
        order.push(Step::Camera);
    }
    order.extend([
        Step::MiniGames,
        Step::VariantChoice,
        Step::SurveyQuestions,
        Step::RewardDraw,
        Step::Completion,
    ]);
    order
}

/// Zero-based index of `step` in the order, with the order's length.
pub fn position(step: Step, config: &FlowConfig) -> Option<(usize, usize)> {
    let order = step_order(config);
    order
        .iter()
        .position(|s| *s == step)
        .map(|index| (index, order.len()))
}
