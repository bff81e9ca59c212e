//! Origin allowlist gate.

use std::collections::HashSet;
use std::net::IpAddr;

use tracing::debug;

use warden_contracts::{config::AllowlistConfig, error::GateResult};
use warden_core::traits::NetworkGate;

/// A `NetworkGate` backed by a validated `AllowlistConfig`.
///
/// Matching is exact address equality; there is no subnet matching. Configured
/// addresses are stored in canonical text form, so `0:0:0:0:0:0:0:1` in the
/// configuration admits a peer reported as `::1`.
#[derive(Debug, Clone)]
pub struct AllowlistGate {
    wildcard: bool,
    origins: HashSet<String>,
}

impl AllowlistGate {
    /// Validate `config` and build the gate.
    ///
    /// Returns `GateError::ConfigError` for an empty list or an entry that is
    /// neither `"*"` nor an IP address.
    pub fn from_config(config: &AllowlistConfig) -> GateResult<Self> {
        config.validate()?;
        let origins = config
            .origins
            .iter()
            .filter_map(|origin| origin.parse::<IpAddr>().ok())
            .map(|ip| ip.to_string())
            .collect();
        Ok(Self {
            wildcard: config.is_wildcard(),
            origins,
        })
    }

    pub fn allows_all(&self) -> bool {
        self.wildcard
    }
}

impl NetworkGate for AllowlistGate {
    fn admit(&self, origin: Option<&str>) -> bool {
        if self.wildcard {
            return true;
        }
        let admitted = origin.is_some_and(|o| self.origins.contains(o));
        debug!(origin = origin.unwrap_or("<none>"), admitted, "allowlist checked");
        admitted
    }
}
