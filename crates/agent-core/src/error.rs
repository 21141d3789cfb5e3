//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for state and stage operations
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// A required state key was not present
    #[error("Missing state key: {0}")]
    MissingKey(String),

    /// State value could not be (de)serialized or was invalid
    #[error("State error: {0}")]
    State(String),

    /// A stage returned an error
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed {
        stage: String,
        reason: String,
    },
}
