//! # warden-core
//!
//! The admission and dispatch runtime for the Warden capability server.
//!
//! This crate provides:
//! - The five admission traits (`NetworkGate`, `IdentityVerifier`,
//!   `CapabilityResolver`, `InputValidator`, `PermissionPolicy`)
//! - `CapabilityEntry` and the `Handler` contract every capability implements
//! - The `DispatchPipeline` that wires them together in admission order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{DispatchPipeline, entry::CapabilityEntry};
//!
//! let pipeline = DispatchPipeline::new(gate, verifier, registry, validator, permissions);
//! let envelope = pipeline.dispatch(request);
//! ```

pub mod entry;
pub mod pipeline;
pub mod traits;

pub use entry::{CapabilityEntry, Handler, HandlerError, Invocation, ResolvedCapability};
pub use pipeline::DispatchPipeline;
