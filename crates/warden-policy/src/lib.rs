//! # warden-policy
//!
//! Admission and consent policy for the Warden capability server.
//!
//! - [`AllowlistGate`] implements
//!   [`NetworkGate`](warden_core::traits::NetworkGate): exact-match origin
//!   allowlisting with a `"*"` wildcard.
//! - [`PermissionEngine`] implements
//!   [`PermissionPolicy`](warden_core::traits::PermissionPolicy): per-kind
//!   defaults plus ordered TOML rules, overridden by an entry's own metadata.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_policy::{AllowlistGate, PermissionEngine};
//!
//! let gate = AllowlistGate::from_config(&allowlist)?;
//! let permissions = PermissionEngine::from_toml_str(r#"
//!     tool = true
//!     [[rules]]
//!     id = "free-math"
//!     address = "add_two_numbers"
//!     requires_permission = false
//! "#)?;
//! ```

pub mod allowlist;
pub mod engine;
pub mod rule;

pub use allowlist::AllowlistGate;
pub use engine::PermissionEngine;
pub use rule::{PermissionConfig, PermissionDefaults, PermissionRule};

// ── Tests ─────────────────────────────────────────────────────────────────────
