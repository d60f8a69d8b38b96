//! Flow progress engine for the consumer micro-flow.
//!
//! A session walks identity capture, optional verification, mini-games,
//! a variant choice and then whichever of survey, reward draw and
//! completion the chosen variant allows. The dependency graph decides what
//! may be entered; the progress store tracks what has been done and
//! persists it after every change.

pub mod dependencies;
pub mod engine;
pub mod order;
pub mod persistence;
pub mod progress;
pub mod routes;
pub mod step;

pub use dependencies::{Requirement, dependencies, dependencies_for_tag};
pub use engine::FlowEngine;
pub use order::{position, step_order};
pub use persistence::Persister;
pub use progress::{ProgressState, ProgressStore};
pub use routes::{FlowRouteState, FlowStatus, flow_routes};
pub use step::{FlowVariant, Step};
