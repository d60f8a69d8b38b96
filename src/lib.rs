//! Flow Progress — dependency-gated step engine for the consumer micro-flow.

pub mod config;
pub mod error;
pub mod flow;
pub mod store;
