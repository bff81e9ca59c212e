//! Startup and registration error types.
//!
//! Per-request failures never surface as `GateError`; the dispatch pipeline
//! turns them into response envelopes. `GateError` covers everything that
//! must stop the server before it accepts its first request.

use thiserror::Error;

use crate::capability::CapabilityAddress;

/// The unified startup error type for the Warden server.
#[derive(Debug, Error)]
pub enum GateError {
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A capability was registered twice under the same kind and address.
    #[error("duplicate registration for {address}")]
    DuplicateCapability { address: CapabilityAddress },

    /// A resource template pattern could not be compiled.
    #[error("invalid resource template '{pattern}': {reason}")]
    InvalidTemplate { pattern: String, reason: String },

    /// A declared input schema is not a valid JSON Schema document.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// Reading a configuration file or binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Shorthand for the most common variant.
    pub fn config(reason: impl Into<String>) -> Self {
        GateError::ConfigError {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the Warden crates.
pub type GateResult<T> = Result<T, GateError>;
