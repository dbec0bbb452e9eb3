// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for rig construction.

use crate::lifecycle::Stage;
use rigkit_graph::GraphError;
use thiserror::Error;

/// Result type for rig operations
pub type RigResult<T> = std::result::Result<T, RigError>;

/// Configuration errors (naming tables, side tables, space priorities)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// RON parse failure
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Side token missing from the side table
    #[error("Unknown side '{0}'")]
    UnknownSide(String),

    /// Strict flipping of a side with no mirror
    #[error("Side '{0}' has no mirror")]
    NotFlippable(String),

    /// A name token that cannot be composed safely
    #[error("Invalid name token '{token}': {reason}")]
    InvalidToken {
        /// Offending token
        token: String,
        /// Why it was rejected
        reason: String,
    },

    /// Side table is not symmetric
    #[error("Side '{side}' mirrors to '{mirror}' which does not mirror back")]
    AsymmetricSide {
        /// Side token
        side: String,
        /// Its declared mirror
        mirror: String,
    },

    /// Listed priorities must sort before every custom space
    #[error("Space '{space}' has priority {index}, inside the custom band starting at {band}")]
    PriorityInCustomBand {
        /// Space name
        space: String,
        /// Configured priority
        index: i32,
        /// Custom band start
        band: i32,
    },

    /// Two listed spaces share a priority
    #[error("Spaces '{first}' and '{second}' share priority {index}")]
    DuplicatePriority {
        /// Space listed first
        first: String,
        /// Space listed second
        second: String,
        /// Shared priority
        index: i32,
    },
}

/// Rig construction errors
#[derive(Debug, Error)]
pub enum RigError {
    /// Host graph failure (missing node/port, type mismatch, cycles)
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Step anchor names an unregistered step
    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    /// Numeric step anchor out of range
    #[error("Step index {index} out of range ({len} steps)")]
    StepIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of registered steps
        len: usize,
    },

    /// No constructor registered for a type tag
    #[error("Unknown rig type '{0}'")]
    UnknownRigType(String),

    /// Rehydration found a different type tag than requested
    #[error("Rig type mismatch: expected '{expected}', found '{found}'")]
    TypeTagMismatch {
        /// Requested tag
        expected: String,
        /// Tag stored in the graph
        found: String,
    },

    /// Space name not present in the space set
    #[error("Unknown space '{0}'")]
    UnknownSpace(String),

    /// A space has no candidate driver
    #[error("No driver given for space '{0}'")]
    MissingCandidate(String),

    /// Construction argument failed validation
    #[error("Invalid argument '{key}': {message}")]
    InvalidArg {
        /// Argument key
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// A handle the wrapper needs has not been created (build has not run)
    #[error("Missing {0}; has build() run?")]
    MissingHandle(&'static str),

    /// Lifecycle operation requested from the wrong stage
    #[error("Cannot {operation} '{rig}' while {stage:?}")]
    WrongStage {
        /// Requested operation
        operation: &'static str,
        /// Rig node name
        rig: String,
        /// Stage the node is in
        stage: Stage,
    },

    /// Stored value is out of range for the field it encodes
    #[error("Stored '{port}' value {value} is out of range")]
    StoredValue {
        /// Port holding the value
        port: &'static str,
        /// Raw stored value
        value: i64,
    },

    /// Rig description could not be parsed
    #[error("Failed to parse rig description: {0}")]
    Description(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RigError {
    /// Shorthand for an invalid-argument error
    pub fn invalid_arg(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArg {
            key: key.into(),
            message: message.into(),
        }
    }
}
