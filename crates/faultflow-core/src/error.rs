//! Unified error type for network construction and studies.
//!
//! Every fallible operation in the workspace returns [`FlowResult`]. Algorithm
//! crates keep their own narrower error enums and convert into [`FlowError`]
//! at the API boundary.
//!
//! Non-convergence of an iterative solve is *not* an error: it is reported
//! through the solution's convergence status so that the caller still gets the
//! best-effort state.
//!
//! # Example
//!
//! ```
//! use faultflow_core::{BusKind, FlowError, FlowResult, Kilovolts, Network};
//!
//! fn build() -> FlowResult<Network> {
//!     let mut network = Network::new();
//!     network.add_bus("Bus1", Kilovolts(20.0), BusKind::Slack)?;
//!     Ok(network)
//! }
//!
//! let mut network = build().unwrap();
//! let err = network
//!     .add_bus("Bus1", Kilovolts(20.0), BusKind::Slack)
//!     .unwrap_err();
//! assert!(matches!(err, FlowError::DuplicateName { .. }));
//! ```

use thiserror::Error;

/// Unified error type for all faultflow operations.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Branch references a missing bus, no slack bus, several slack buses,
    /// or an empty network.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Unrecognized bus classification, or an element attached to a bus
    /// whose classification does not allow it.
    #[error("Invalid bus type: {0}")]
    InvalidBusType(String),

    /// A bus, branch, generator or load name was registered twice.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    /// A Jacobian or admittance matrix could not be factorized.
    #[error("Singular system: {0}")]
    SingularSystem(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using FlowError.
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        FlowError::DuplicateName {
            kind,
            name: name.into(),
        }
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(err: toml::de::Error) -> Self {
        FlowError::Parse(err.to_string())
    }
}
