//! JSON Schema input validator for the Warden dispatch pipeline.
//!
//! `SchemaValidator` implements the `InputValidator` trait from `warden-core`.
//! Arguments are checked against the entry's declared `InputSchema` with the
//! `jsonschema` crate. Every violation is collected before returning so the
//! caller sees the full failure set in one response.
//!
//! Schemas are also checked once at startup through `check_schema`, so a
//! malformed document stops the server instead of failing every request.

use serde_json::Value;
use tracing::{debug, warn};

use warden_contracts::{
    error::{GateError, GateResult},
    schema::{InputSchema, ValidationFailure, ValidationReport},
};
use warden_core::{entry::CapabilityEntry, traits::InputValidator};

/// The Warden input validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Confirm `schema` compiles.
    ///
    /// Returns `GateError::SchemaValidation` naming the owning capability when
    /// it does not.
    pub fn check_schema(&self, owner: &str, schema: &InputSchema) -> GateResult<()> {
        if schema.json_schema.is_null() {
            return Ok(());
        }
        jsonschema::validator_for(&schema.json_schema)
            .map(|_| ())
            .map_err(|e| GateError::SchemaValidation {
                reason: format!("input schema for '{owner}' is invalid: {e}"),
            })
    }

    /// Check every entry's schema, stopping at the first invalid one.
    pub fn check_entries<'a, I>(&self, entries: I) -> GateResult<()>
    where
        I: IntoIterator<Item = &'a CapabilityEntry>,
    {
        for entry in entries {
            self.check_schema(&entry.address, &entry.input_schema)?;
        }
        Ok(())
    }
}

impl InputValidator for SchemaValidator {
    /// Validate `arguments` against `schema`.
    ///
    /// A null schema document means "no structural constraint". A schema that
    /// fails to compile is reported as a single root failure rather than
    /// crashing the request.
    fn validate(&self, arguments: &Value, schema: &InputSchema) -> ValidationReport {
        if schema.json_schema.is_null() {
            return ValidationReport::pass();
        }

        let validator = match jsonschema::validator_for(&schema.json_schema) {
            Ok(validator) => validator,
            Err(e) => {
                let message = format!("invalid input schema document: {e}");
                warn!(%message, "schema compilation failure");
                return ValidationReport::from_failures(vec![ValidationFailure {
                    path: String::new(),
                    message,
                }]);
            }
        };

        let failures: Vec<ValidationFailure> = validator
            .iter_errors(arguments)
            .map(|error| ValidationFailure {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        debug!(
            passed = failures.is_empty(),
            failure_count = failures.len(),
            "input validation complete"
        );

        ValidationReport::from_failures(failures)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
