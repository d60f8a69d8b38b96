//! Step vocabulary and flow variants.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// A named stage of the consumer micro-flow.
///
/// The vocabulary is closed. Declaration order follows the consumer flow so
/// ordered sets of steps read naturally in logs and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Identity capture (name, phone). Default entry point.
    Identity,
    /// One-time password verification.
    Otp,
    /// Selfie / proof-of-presence capture.
    Camera,
    /// Mini-games lobby.
    MiniGames,
    /// The participant picks quick, full, or no-games.
    VariantChoice,
    /// Survey questionnaire.
    SurveyQuestions,
    /// Reward draw (spin).
    RewardDraw,
    /// Thank-you / completion screen. Terminal.
    Completion,
    /// Entry point of the partner surface.
    PartnerLanding,
    /// Identity capture on the partner surface.
    PartnerIdentity,
}

impl Step {
    /// Every step in declaration order.
    pub const ALL: [Step; 10] = [
        Step::Identity,
        Step::Otp,
        Step::Camera,
        Step::MiniGames,
        Step::VariantChoice,
        Step::SurveyQuestions,
        Step::RewardDraw,
        Step::Completion,
        Step::PartnerLanding,
        Step::PartnerIdentity,
    ];

    /// Wire tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Otp => "otp",
            Self::Camera => "camera",
            Self::MiniGames => "mini-games",
            Self::VariantChoice => "variant-choice",
            Self::SurveyQuestions => "survey-questions",
            Self::RewardDraw => "reward-draw",
            Self::Completion => "completion",
            Self::PartnerLanding => "partner-landing",
            Self::PartnerIdentity => "partner-identity",
        }
    }

    /// Whether this step ends the flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion)
    }

    /// Whether reachability of this step depends on the selected variant.
    pub fn is_variant_gated(&self) -> bool {
        matches!(
            self,
            Self::SurveyQuestions | Self::RewardDraw | Self::Completion
        )
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Identity
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| FlowError::UnknownStep(s.to_string()))
    }
}

/// One of the three mutually exclusive session shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowVariant {
    /// Games, then straight to the reward draw.
    Quick,
    /// Games, survey, then the reward draw.
    Full,
    /// Survey only. No reward draw.
    NoGames,
}

impl FlowVariant {
    pub const ALL: [FlowVariant; 3] = [FlowVariant::Quick, FlowVariant::Full, FlowVariant::NoGames];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
            Self::NoGames => "no-games",
        }
    }

    /// Reward-draw attempts granted for a session of this shape.
    pub fn spin_allowance(&self) -> u32 {
        match self {
            Self::Quick | Self::Full => 1,
            Self::NoGames => 0,
        }
    }
}

impl std::fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowVariant {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| FlowError::UnknownVariant(s.to_string()))
    }
}
