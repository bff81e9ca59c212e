//! Process-wide trust and network configuration.
//!
//! Both values are built once at startup, validated, and then shared
//! read-only for the lifetime of the process. There is no hot reload.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

/// Minimum length of a shared HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default refresh interval for a cached published key set.
pub const DEFAULT_KEY_SET_REFRESH: Duration = Duration::from_secs(300);

/// The allowlist entry that admits every origin.
pub const WILDCARD_ORIGIN: &str = "*";

/// JWS algorithms a credential may be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    EdDSA,
}

impl SigningAlgorithm {
    /// True for the shared-secret (HMAC) family.
    pub fn is_hmac(&self) -> bool {
        matches!(
            self,
            SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::HS384 => "HS384",
            SigningAlgorithm::HS512 => "HS512",
            SigningAlgorithm::RS256 => "RS256",
            SigningAlgorithm::RS384 => "RS384",
            SigningAlgorithm::RS512 => "RS512",
            SigningAlgorithm::PS256 => "PS256",
            SigningAlgorithm::PS384 => "PS384",
            SigningAlgorithm::PS512 => "PS512",
            SigningAlgorithm::ES256 => "ES256",
            SigningAlgorithm::ES384 => "ES384",
            SigningAlgorithm::EdDSA => "EdDSA",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let alg = match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => SigningAlgorithm::HS256,
            "HS384" => SigningAlgorithm::HS384,
            "HS512" => SigningAlgorithm::HS512,
            "RS256" => SigningAlgorithm::RS256,
            "RS384" => SigningAlgorithm::RS384,
            "RS512" => SigningAlgorithm::RS512,
            "PS256" => SigningAlgorithm::PS256,
            "PS384" => SigningAlgorithm::PS384,
            "PS512" => SigningAlgorithm::PS512,
            "ES256" => SigningAlgorithm::ES256,
            "ES384" => SigningAlgorithm::ES384,
            "EDDSA" => SigningAlgorithm::EdDSA,
            other => {
                return Err(GateError::config(format!(
                    "unsupported signing algorithm '{other}'"
                )))
            }
        };
        Ok(alg)
    }
}

/// Where verification keys come from.
#[derive(Debug)]
pub enum VerificationMode {
    /// A single HMAC secret shared with the token issuer.
    SharedSecret { secret: SecretString },

    /// A JSON Web Key Set published at `url`, cached for `refresh`.
    KeySet { url: String, refresh: Duration },
}

/// Trust parameters for bearer credential verification.
#[derive(Debug)]
pub struct TrustConfig {
    pub mode: VerificationMode,
    /// Expected `iss`. `None` leaves the issuer unchecked.
    pub issuer: Option<String>,
    /// Expected member of `aud`. `None` leaves the audience unchecked.
    pub audience: Option<String>,
    /// The only algorithm a credential may be signed with.
    pub algorithm: SigningAlgorithm,
}

impl TrustConfig {
    /// Shared-secret trust pinned to `algorithm`.
    pub fn shared_secret(secret: impl Into<String>, algorithm: SigningAlgorithm) -> Self {
        Self {
            mode: VerificationMode::SharedSecret {
                secret: SecretString::from(secret.into()),
            },
            issuer: None,
            audience: None,
            algorithm,
        }
    }

    /// Published key-set trust pinned to `algorithm`.
    pub fn key_set(url: impl Into<String>, algorithm: SigningAlgorithm) -> Self {
        Self {
            mode: VerificationMode::KeySet {
                url: url.into(),
                refresh: DEFAULT_KEY_SET_REFRESH,
            },
            issuer: None,
            audience: None,
            algorithm,
        }
    }

    /// Set the expected issuer. An empty string leaves it unchecked.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = non_empty(issuer.into());
        self
    }

    /// Set the expected audience. An empty string leaves it unchecked.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = non_empty(audience.into());
        self
    }

    /// Check every startup invariant.
    ///
    /// Returns `GateError::ConfigError` if the shared secret is shorter than
    /// `MIN_SECRET_LEN`, if shared-secret mode is pinned to a non-HMAC
    /// algorithm, or if key-set mode has no URL or a zero refresh interval.
    pub fn validate(&self) -> GateResult<()> {
        match &self.mode {
            VerificationMode::SharedSecret { secret } => {
                let len = secret.expose_secret().len();
                if len < MIN_SECRET_LEN {
                    return Err(GateError::config(format!(
                        "shared secret must be at least {MIN_SECRET_LEN} bytes, got {len}"
                    )));
                }
                if !self.algorithm.is_hmac() {
                    return Err(GateError::config(format!(
                        "shared-secret verification requires an HMAC algorithm, got {}",
                        self.algorithm
                    )));
                }
            }
            VerificationMode::KeySet { url, refresh } => {
                if url.trim().is_empty() {
                    return Err(GateError::config("key-set verification requires a key-set URL"));
                }
                if refresh.is_zero() {
                    return Err(GateError::config("key-set refresh interval must be non-zero"));
                }
            }
        }
        Ok(())
    }
}

/// The set of origin addresses allowed to reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistConfig {
    pub origins: Vec<String>,
}

impl AllowlistConfig {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins.into_iter().map(|s| s.into().trim().to_string()).collect(),
        }
    }

    /// An allowlist that admits every origin.
    pub fn allow_all() -> Self {
        Self::new([WILDCARD_ORIGIN])
    }

    pub fn is_wildcard(&self) -> bool {
        self.origins.iter().any(|o| o == WILDCARD_ORIGIN)
    }

    /// Reject an empty list or any entry that is neither `"*"` nor an IP address.
    pub fn validate(&self) -> GateResult<()> {
        if self.origins.is_empty() {
            return Err(GateError::config(
                "allowlist must contain at least one origin or '*'",
            ));
        }
        for origin in &self.origins {
            if origin == WILDCARD_ORIGIN {
                continue;
            }
            if origin.parse::<IpAddr>().is_err() {
                return Err(GateError::config(format!(
                    "allowlist entry '{origin}' is not an IP address"
                )));
            }
        }
        Ok(())
    }
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self::allow_all()
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
