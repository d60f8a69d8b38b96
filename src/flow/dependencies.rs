//! Dependency graph: which steps must be complete before a step opens.
//!
//! Every dependency set is stated transitively closed, so a step is
//! accessible iff its whole set is already in the completed set.

use std::collections::BTreeSet;

use crate::config::FlowConfig;

use super::step::{FlowVariant, Step};

/// What a step needs before it can be entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Accessible once every listed step is complete. Empty means open.
    Steps(BTreeSet<Step>),
    /// Never accessible in the current variant.
    Unreachable,
}

impl Requirement {
    fn open() -> Self {
        Self::Steps(BTreeSet::new())
    }

    fn steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Steps(steps.into_iter().collect())
    }

    /// Whether `completed` satisfies this requirement.
    pub fn is_satisfied_by(&self, completed: &BTreeSet<Step>) -> bool {
        match self {
            Self::Steps(required) => required.is_subset(completed),
            Self::Unreachable => false,
        }
    }

    /// Required steps not yet in `completed`, in flow order.
    ///
    /// Empty for `Unreachable`: nothing the caller completes will help.
    pub fn missing(&self, completed: &BTreeSet<Step>) -> Vec<Step> {
        match self {
            Self::Steps(required) => required.difference(completed).copied().collect(),
            Self::Unreachable => Vec::new(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable)
    }
}

/// Identity plus whichever verification steps `config` enables.
fn gate_prefix(config: &FlowConfig) -> Vec<Step> {
    match (config.requires_otp, config.requires_camera) {
        (true, true) => vec![Step::Identity, Step::Otp, Step::Camera],
        (true, false) => vec![Step::Identity, Step::Otp],
        (false, true) => vec![Step::Identity, Step::Camera],
        (false, false) => vec![Step::Identity],
    }
}

/// Everything up to and including the variant choice.
fn variant_chain(config: &FlowConfig) -> Vec<Step> {
    let mut chain = gate_prefix(config);
    chain.extend([Step::MiniGames, Step::VariantChoice]);
    chain
}

fn chain_with(config: &FlowConfig, extra: &[Step]) -> Requirement {
    Requirement::steps(variant_chain(config).into_iter().chain(extra.iter().copied()))
}

/// Requirement for entering `step` under `variant` and `config`.
pub fn dependencies(step: Step, variant: Option<FlowVariant>, config: &FlowConfig) -> Requirement {
    use FlowVariant::*;
    use Step::*;

    match (step, variant) {
        (Identity | PartnerLanding | PartnerIdentity, _) => Requirement::open(),
        (Otp | Camera, _) => Requirement::steps([Identity]),
        (MiniGames, _) => Requirement::steps(gate_prefix(config)),
        (VariantChoice, _) => {
            Requirement::steps(gate_prefix(config).into_iter().chain([MiniGames]))
        }

        (SurveyQuestions | RewardDraw | Completion, None) => Requirement::Unreachable,

        (SurveyQuestions, Some(NoGames)) => chain_with(config, &[]),
        (RewardDraw, Some(NoGames)) => Requirement::Unreachable,
        (Completion, Some(NoGames)) => chain_with(config, &[SurveyQuestions]),

        (SurveyQuestions, Some(Quick)) => Requirement::Unreachable,
        (RewardDraw, Some(Quick)) => chain_with(config, &[]),
        (Completion, Some(Quick)) => chain_with(config, &[RewardDraw]),

        (SurveyQuestions, Some(Full)) => chain_with(config, &[]),
        (RewardDraw, Some(Full)) => chain_with(config, &[SurveyQuestions]),
        (Completion, Some(Full)) => chain_with(config, &[SurveyQuestions, RewardDraw]),
    }
}

/// Requirement for a raw step tag.
///
/// Unrecognized tags fail open with an empty requirement.
pub fn dependencies_for_tag(
    tag: &str,
    variant: Option<FlowVariant>,
    config: &FlowConfig,
) -> Requirement {
    match tag.parse::<Step>() {
        Ok(step) => dependencies(step, variant, config),
        Err(_) => {
            tracing::debug!(tag, "Unrecognized step tag, treating as open");
            Requirement::open()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CONFIGS: [FlowConfig; 4] = [
        FlowConfig {
            requires_otp: true,
            requires_camera: true,
        },
        FlowConfig {
            requires_otp: true,
            requires_camera: false,
        },
        FlowConfig {
            requires_otp: false,
            requires_camera: true,
        },
        FlowConfig {
            requires_otp: false,
            requires_camera: false,
        },
    ];

    fn set(steps: &[Step]) -> BTreeSet<Step> {
        steps.iter().copied().collect()
    }

    fn full_config() -> FlowConfig {
        ALL_CONFIGS[0]
    }

    #[test]
    fn entry_points_are_open() {
        for step in [Step::Identity, Step::PartnerLanding, Step::PartnerIdentity] {
            assert_eq!(
                dependencies(step, None, &full_config()),
                Requirement::Steps(BTreeSet::new())
            );
        }
    }

    #[test]
    fn verification_steps_need_identity() {
        for config in ALL_CONFIGS {
            assert_eq!(
                dependencies(Step::Otp, None, &config),
                Requirement::Steps(set(&[Step::Identity]))
            );
            assert_eq!(
                dependencies(Step::Camera, Some(FlowVariant::Quick), &config),
                Requirement::Steps(set(&[Step::Identity]))
            );
        }
    }

    #[test]
    fn mini_games_branch_on_config() {
        let expected = [
            set(&[Step::Identity, Step::Otp, Step::Camera]),
            set(&[Step::Identity, Step::Otp]),
            set(&[Step::Identity, Step::Camera]),
            set(&[Step::Identity]),
        ];
        for (config, want) in ALL_CONFIGS.iter().zip(expected) {
            assert_eq!(
                dependencies(Step::MiniGames, None, config),
                Requirement::Steps(want.clone())
            );
            let mut choice = want;
            choice.insert(Step::MiniGames);
            assert_eq!(
                dependencies(Step::VariantChoice, None, config),
                Requirement::Steps(choice)
            );
        }
    }

    #[test]
    fn unset_variant_blocks_gated_steps() {
        for config in ALL_CONFIGS {
            for step in [Step::SurveyQuestions, Step::RewardDraw, Step::Completion] {
                assert!(dependencies(step, None, &config).is_unreachable());
            }
        }
    }

    #[test]
    fn no_games_skips_reward_draw() {
        let config = full_config();
        let chain = variant_chain(&config);

        assert_eq!(
            dependencies(Step::SurveyQuestions, Some(FlowVariant::NoGames), &config),
            Requirement::Steps(set(&chain))
        );
        assert!(dependencies(Step::RewardDraw, Some(FlowVariant::NoGames), &config).is_unreachable());

        let mut completion = set(&chain);
        completion.insert(Step::SurveyQuestions);
        assert_eq!(
            dependencies(Step::Completion, Some(FlowVariant::NoGames), &config),
            Requirement::Steps(completion)
        );
    }

    #[test]
    fn quick_skips_survey() {
        let config = ALL_CONFIGS[3];
        assert!(
            dependencies(Step::SurveyQuestions, Some(FlowVariant::Quick), &config).is_unreachable()
        );
        assert_eq!(
            dependencies(Step::RewardDraw, Some(FlowVariant::Quick), &config),
            Requirement::Steps(set(&[Step::Identity, Step::MiniGames, Step::VariantChoice]))
        );
        assert_eq!(
            dependencies(Step::Completion, Some(FlowVariant::Quick), &config),
            Requirement::Steps(set(&[
                Step::Identity,
                Step::MiniGames,
                Step::VariantChoice,
                Step::RewardDraw,
            ]))
        );
    }

    #[test]
    fn full_requires_everything() {
        let config = full_config();
        let reward = dependencies(Step::RewardDraw, Some(FlowVariant::Full), &config);
        assert_eq!(
            reward,
            Requirement::Steps(set(&[
                Step::Identity,
                Step::Otp,
                Step::Camera,
                Step::MiniGames,
                Step::VariantChoice,
                Step::SurveyQuestions,
            ]))
        );

        let Requirement::Steps(completion) =
            dependencies(Step::Completion, Some(FlowVariant::Full), &config)
        else {
            panic!("completion must be reachable under full");
        };
        assert!(completion.contains(&Step::SurveyQuestions));
        assert!(completion.contains(&Step::RewardDraw));
        assert!(!completion.contains(&Step::Completion));
    }

    #[test]
    fn graph_is_acyclic() {
        // No step may require itself, and every requirement must be
        // closed: each dependency's own dependencies are included.
        for config in ALL_CONFIGS {
            for variant in [None, Some(FlowVariant::Quick), Some(FlowVariant::Full), Some(FlowVariant::NoGames)] {
                for step in Step::ALL {
                    let Requirement::Steps(required) = dependencies(step, variant, &config) else {
                        continue;
                    };
                    assert!(!required.contains(&step), "{step} requires itself");
                    for dep in &required {
                        if let Requirement::Steps(inner) = dependencies(*dep, variant, &config) {
                            assert!(
                                inner.is_subset(&required),
                                "{step} under {variant:?} is missing transitive deps of {dep}"
                            );
                        } else {
                            panic!("{step} depends on unreachable {dep} under {variant:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn missing_lists_outstanding_steps_in_order() {
        let req = dependencies(Step::MiniGames, None, &full_config());
        let completed = set(&[Step::Identity]);
        assert_eq!(req.missing(&completed), vec![Step::Otp, Step::Camera]);
        assert!(!req.is_satisfied_by(&completed));
        assert!(req.is_satisfied_by(&set(&[Step::Identity, Step::Otp, Step::Camera])));
    }

    #[test]
    fn unreachable_is_never_satisfied() {
        let everything: BTreeSet<Step> = Step::ALL.into_iter().collect();
        assert!(!Requirement::Unreachable.is_satisfied_by(&everything));
        assert!(Requirement::Unreachable.missing(&everything).is_empty());
    }

    #[test]
    fn unknown_tag_fails_open() {
        let req = dependencies_for_tag("bonus-round", None, &full_config());
        assert!(req.is_satisfied_by(&BTreeSet::new()));

        let known = dependencies_for_tag("otp", None, &full_config());
        assert_eq!(known, Requirement::Steps(set(&[Step::Identity])));
    }
}
