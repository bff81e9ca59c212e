//! Server configuration.
//!
//! A `ServerConfig` is read once at startup from an optional TOML file, then
//! overlaid with command-line flags and `MCP_SERVER_*` environment variables.
//! `validate` turns every fatal condition into a `ConfigError` before the
//! listener binds.
//!
//! ```toml
//! [server]
//! name = "Warden Template Server"
//! bind = "0.0.0.0:8001"
//!
//! [auth]
//! mode = "shared-secret"          # or "key-set"
//! secret = "at-least-32-bytes-of-shared-secret!!"
//! issuer = "https://issuer.example"
//! audience = "warden"
//! algorithm = "HS256"
//!
//! [network]
//! allowed_origins = ["10.0.0.1", "10.0.0.2"]
//!
//! [permissions]
//! tool = true
//! resource = false
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use warden_contracts::{
    config::{AllowlistConfig, SigningAlgorithm, TrustConfig, VerificationMode, WILDCARD_ORIGIN},
    error::{GateError, GateResult},
};
use warden_policy::PermissionConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:8001";
pub const DEFAULT_SERVER_NAME: &str = "Warden Template Server";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub network: NetworkSection,
    pub permissions: PermissionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub name: String,
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    #[default]
    SharedSecret,
    KeySet,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub mode: AuthMode,
    pub secret: Option<String>,
    pub jwks_url: Option<String>,
    pub jwks_refresh_secs: u64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub algorithm: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            mode: AuthMode::SharedSecret,
            secret: None,
            jwks_url: None,
            jwks_refresh_secs: 300,
            issuer: None,
            audience: None,
            algorithm: SigningAlgorithm::HS256.to_string(),
        }
    }
}

impl fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSection")
            .field("mode", &self.mode)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("jwks_url", &self.jwks_url)
            .field("jwks_refresh_secs", &self.jwks_refresh_secs)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub allowed_origins: Vec<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            allowed_origins: vec![WILDCARD_ORIGIN.to_string()],
        }
    }
}

/// Values that take precedence over the configuration file.
///
/// Setting a key-set URL switches verification to key-set mode.
#[derive(Clone, Default, Args)]
pub struct Overrides {
    /// Shared HMAC secret (at least 32 bytes).
    #[arg(long, env = "MCP_SERVER_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Expected `iss` claim. Empty leaves the issuer unchecked.
    #[arg(long, env = "MCP_SERVER_JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Expected `aud` member. Empty leaves the audience unchecked.
    #[arg(long, env = "MCP_SERVER_JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// Pinned signing algorithm, e.g. HS256 or RS256.
    #[arg(long, env = "MCP_SERVER_JWT_ALGORITHM")]
    pub jwt_algorithm: Option<String>,

    /// URL of a published JSON Web Key Set.
    #[arg(long, env = "MCP_SERVER_JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Comma-separated client IP allowlist, or "*".
    #[arg(long, env = "MCP_SERVER_ALLOWED_IPS", value_delimiter = ',')]
    pub allowed_ips: Vec<String>,

    /// Listen address.
    #[arg(long, env = "MCP_SERVER_BIND")]
    pub bind: Option<String>,
}

impl ServerConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `GateError::ConfigError` if the document is malformed.
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        toml::from_str(s).map_err(|e| GateError::config(format!("failed to parse config TOML: {e}")))
    }

    pub fn from_file(path: &Path) -> GateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GateError::config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path` if given, otherwise start from defaults, then apply
    /// `overrides`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> GateResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(secret) = &overrides.jwt_secret {
            self.auth.secret = Some(secret.clone());
        }
        if let Some(issuer) = &overrides.jwt_issuer {
            self.auth.issuer = Some(issuer.clone());
        }
        if let Some(audience) = &overrides.jwt_audience {
            self.auth.audience = Some(audience.clone());
        }
        if let Some(algorithm) = &overrides.jwt_algorithm {
            self.auth.algorithm = algorithm.clone();
        }
        if let Some(url) = overrides.jwks_url.as_ref().filter(|u| !u.trim().is_empty()) {
            self.auth.jwks_url = Some(url.clone());
            self.auth.mode = AuthMode::KeySet;
        }
        if !overrides.allowed_ips.is_empty() {
            self.network.allowed_origins = overrides.allowed_ips.clone();
        }
        if let Some(bind) = &overrides.bind {
            self.server.bind = bind.clone();
        }
    }

    /// Build and validate the trust configuration.
    pub fn trust_config(&self) -> GateResult<TrustConfig> {
        let auth = &self.auth;
        let algorithm: SigningAlgorithm = auth.algorithm.parse()?;

        let mut trust = match auth.mode {
            AuthMode::SharedSecret => {
                let secret = auth.secret.as_deref().unwrap_or_default();
                if secret.is_empty() {
                    return Err(GateError::config(
                        "shared-secret mode requires a secret (set MCP_SERVER_JWT_SECRET)",
                    ));
                }
                TrustConfig::shared_secret(secret, algorithm)
            }
            AuthMode::KeySet => {
                let url = auth.jwks_url.as_deref().unwrap_or_default();
                let mut trust = TrustConfig::key_set(url, algorithm);
                if let VerificationMode::KeySet { refresh, .. } = &mut trust.mode {
                    *refresh = Duration::from_secs(auth.jwks_refresh_secs);
                }
                trust
            }
        };
        if let Some(issuer) = &auth.issuer {
            trust = trust.with_issuer(issuer.clone());
        }
        if let Some(audience) = &auth.audience {
            trust = trust.with_audience(audience.clone());
        }

        trust.validate()?;
        Ok(trust)
    }

    /// Build and validate the origin allowlist.
    pub fn allowlist_config(&self) -> GateResult<AllowlistConfig> {
        let allowlist = AllowlistConfig::new(self.network.allowed_origins.iter().cloned());
        allowlist.validate()?;
        Ok(allowlist)
    }

    /// Check every fatal startup condition.
    pub fn validate(&self) -> GateResult<()> {
        self.trust_config()?;
        self.allowlist_config()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
