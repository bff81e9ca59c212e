//! # warden-contracts
//!
//! Shared types, errors, and configuration contracts for the Warden
//! capability server.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, error types, and startup validation of
//! configuration values.

pub mod auth;
pub mod capability;
pub mod config;
pub mod envelope;
pub mod error;
pub mod request;
pub mod schema;
