//! # warden-verify
//!
//! Input validation for the Warden capability server.
//!
//! This crate provides [`engine::SchemaValidator`], which implements the
//! [`warden_core::traits::InputValidator`] trait. Arguments are validated
//! structurally against each capability's declared JSON Schema via the
//! `jsonschema` crate; no schema is ever inferred from handler code.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_verify::SchemaValidator;
//!
//! let validator = SchemaValidator::new();
//! validator.check_entries(registry.entries())?; // fail fast at startup
//! ```

pub mod engine;

pub use engine::SchemaValidator;
