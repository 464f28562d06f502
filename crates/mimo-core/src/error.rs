//! Unified error types for the MIMO workspace
//!
//! This module provides a common error type [`MimoError`] shared by the
//! converter definitions, the model builder and the configuration adapters.
//! Construction-time problems surface as [`MimoError::Configuration`], failed
//! name resolution during model build as [`MimoError::Lookup`].
//!
//! # Example
//!
//! ```ignore
//! use mimo_core::{MimoError, MimoResult};
//!
//! fn build(config: MimoConfig) -> MimoResult<Model> {
//!     let converter = MimoConverter::new(config)?;
//!     es.add_mimo(converter)?;
//!     Model::new(&es)
//! }
//! ```

use thiserror::Error;

/// Unified error type for all converter and model operations.
#[derive(Error, Debug)]
pub enum MimoError {
    /// Invalid converter or constraint configuration, detected at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced bus, group or record entry could not be resolved
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A configuration value has an unsupported type
    #[error("Type error: {0}")]
    Type(String),

    /// Energy-system graph errors (unknown or duplicate labels)
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Solver errors other than infeasibility or unboundedness
    #[error("Solver error: {0}")]
    Solver(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using MimoError.
pub type MimoResult<T> = Result<T, MimoError>;

impl From<anyhow::Error> for MimoError {
    fn from(err: anyhow::Error) -> Self {
        MimoError::Other(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for MimoError {
    fn from(err: serde_json::Error) -> Self {
        MimoError::Parse(err.to_string())
    }
}
