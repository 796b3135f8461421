//! Error types
//!
//! The simulation itself never fails for expected conditions (full store,
//! empty tree, unknown particle type). Errors only cover programmer mistakes
//! in the tree protocol and problems loading scenario files.

use thiserror::Error;

/// Precondition violations of the [`SpatialTree`](crate::SpatialTree) protocol
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("mass aggregates requested before the tree was built")]
    NotBuilt,
}

/// Failures while loading or validating a scenario
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}
