//! # warden-registry
//!
//! The capability catalog: tools, resources, resource templates, and prompts
//! keyed by protocol address. Implements
//! [`warden_core::traits::CapabilityResolver`].
//!
//! Resource templates are compiled once at registration into anchored
//! regular expressions (see [`template::UriTemplate`]).

pub mod registry;
pub mod template;

pub use registry::CapabilityRegistry;
pub use template::UriTemplate;
