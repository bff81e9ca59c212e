//! TOML-driven permission policy.
//!
//! `PermissionEngine` implements the `PermissionPolicy` trait from
//! warden-core. Precedence, highest first:
//!
//! 1. an explicit `requires_permission` boolean in the entry's own metadata;
//! 2. the first operator rule matching the entry's kind and address;
//! 3. the kind default.
//!
//! The result is advisory. It is attached to the response envelope and never
//! blocks a call.

use tracing::debug;

use warden_contracts::error::{GateError, GateResult};
use warden_core::{entry::CapabilityEntry, traits::PermissionPolicy};

use crate::rule::PermissionConfig;

#[derive(Debug, Clone, Default)]
pub struct PermissionEngine {
    config: PermissionConfig,
}

impl PermissionEngine {
    pub fn new(config: PermissionConfig) -> Self {
        Self { config }
    }

    /// Parse `s` as a TOML permission policy.
    ///
    /// Returns `GateError::ConfigError` if the document is malformed or does
    /// not match `PermissionConfig`.
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        let config: PermissionConfig = toml::from_str(s)
            .map_err(|e| GateError::config(format!("failed to parse permission TOML: {e}")))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PermissionConfig {
        &self.config
    }
}

impl PermissionPolicy for PermissionEngine {
    fn requires_permission(&self, entry: &CapabilityEntry) -> bool {
        if let Some(explicit) = entry.permission_override() {
            return explicit;
        }

        if let Some(rule) = self
            .config
            .rules
            .iter()
            .find(|rule| rule.matches(entry.kind, &entry.address))
        {
            debug!(
                rule_id = %rule.id,
                kind = %entry.kind,
                address = %entry.address,
                requires_permission = rule.requires_permission,
                "permission rule matched"
            );
            return rule.requires_permission;
        }

        self.config.defaults.for_kind(entry.kind)
    }
}
