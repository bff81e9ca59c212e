//! JWT bearer credential verifier.
//!
//! Verification order:
//! 1. Decode the header and reject any algorithm other than the pinned one.
//! 2. Pick the key: the shared secret, or the published key named by `kid`.
//! 3. Verify the signature and decode the claims.
//! 4. Reject credentials whose `exp` is not strictly in the future.
//! 5. Compare `iss` and `aud` against the configured values, when set.
//!
//! No credential, secret, or key material is ever written to a log event.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::debug;

use warden_contracts::{
    auth::{AuthContext, AuthError},
    config::{SigningAlgorithm, TrustConfig, VerificationMode, DEFAULT_KEY_SET_REFRESH},
    error::GateResult,
};
use warden_core::traits::IdentityVerifier;

use crate::keyset::{HttpKeySetSource, KeySetCache, KeySetSource};

enum KeyMaterial {
    Secret(DecodingKey),
    KeySet(KeySetCache),
}

/// Verifies bearer credentials against a validated `TrustConfig`.
pub struct JwtVerifier {
    keys: KeyMaterial,
    pinned: SigningAlgorithm,
    algorithm: Algorithm,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtVerifier {
    /// Build a verifier from `config`, validating it first.
    ///
    /// In key-set mode this creates a blocking HTTP client, so call it before
    /// entering an async runtime.
    pub fn from_config(config: &TrustConfig) -> GateResult<Self> {
        config.validate()?;
        let keys = match &config.mode {
            VerificationMode::SharedSecret { secret } => {
                KeyMaterial::Secret(DecodingKey::from_secret(secret.expose_secret().as_bytes()))
            }
            VerificationMode::KeySet { url, refresh } => KeyMaterial::KeySet(KeySetCache::new(
                Box::new(HttpKeySetSource::new(url.clone())?),
                *refresh,
            )),
        };
        Ok(Self::assemble(config, keys))
    }

    /// Build a key-set verifier that reads keys from `cache` instead of the
    /// configured URL. The mode in `config` is still validated.
    pub fn with_key_cache(config: &TrustConfig, cache: KeySetCache) -> GateResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, KeyMaterial::KeySet(cache)))
    }

    /// Shorthand for `with_key_cache` with the configured refresh interval.
    pub fn with_key_source(config: &TrustConfig, source: Box<dyn KeySetSource>) -> GateResult<Self> {
        let refresh = match &config.mode {
            VerificationMode::KeySet { refresh, .. } => *refresh,
            VerificationMode::SharedSecret { .. } => DEFAULT_KEY_SET_REFRESH,
        };
        Self::with_key_cache(config, KeySetCache::new(source, refresh))
    }

    fn assemble(config: &TrustConfig, keys: KeyMaterial) -> Self {
        Self {
            keys,
            pinned: config.algorithm,
            algorithm: jwt_algorithm(config.algorithm),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.pinned
    }

    fn algorithm_mismatch(&self, found: Algorithm) -> AuthError {
        AuthError::AlgorithmMismatch {
            expected: self.pinned.to_string(),
            found: format!("{found:?}"),
        }
    }

    fn check_issuer(&self, claims: &Map<String, Value>) -> Result<(), AuthError> {
        let Some(expected) = &self.issuer else {
            return Ok(());
        };
        match claims.get("iss").and_then(Value::as_str) {
            Some(iss) if iss == expected => Ok(()),
            _ => Err(AuthError::IssuerMismatch),
        }
    }

    fn check_audience(&self, claims: &Map<String, Value>) -> Result<(), AuthError> {
        let Some(expected) = &self.audience else {
            return Ok(());
        };
        if audience_of(claims).iter().any(|aud| aud == expected) {
            Ok(())
        } else {
            Err(AuthError::AudienceMismatch)
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<AuthContext, AuthError> {
        let header = jsonwebtoken::decode_header(credential)
            .map_err(|e| match declared_algorithm(credential) {
                // `none` and algorithms `jsonwebtoken` does not model fail to
                // decode, but they are still a mismatch with the pinned one.
                Some(found) if found != self.pinned.as_str() => AuthError::AlgorithmMismatch {
                    expected: self.pinned.to_string(),
                    found,
                },
                _ => AuthError::Malformed {
                    reason: e.to_string(),
                },
            })?;
        if header.alg != self.algorithm {
            return Err(self.algorithm_mismatch(header.alg));
        }

        let fetched;
        let key = match &self.keys {
            KeyMaterial::Secret(key) => key,
            KeyMaterial::KeySet(cache) => {
                fetched = cache.key_for(header.kid.as_deref())?;
                &fetched
            }
        };

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        // Audience and issuer are compared below so that mismatches map to
        // their own reason codes.
        validation.validate_aud = false;

        let claims = jsonwebtoken::decode::<Map<String, Value>>(credential, key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                // The header already matched the pin, so the published key
                // belongs to another algorithm family.
                ErrorKind::InvalidAlgorithm => AuthError::KeySetUnavailable {
                    reason: "published key does not fit the pinned algorithm".to_string(),
                },
                _ => AuthError::Malformed {
                    reason: e.to_string(),
                },
            })?
            .claims;

        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
            .ok_or_else(|| AuthError::Malformed {
                reason: "'exp' claim is not a valid timestamp".to_string(),
            })?;
        if expires_at <= Utc::now() {
            return Err(AuthError::Expired);
        }

        self.check_issuer(&claims)?;
        self.check_audience(&claims)?;

        let subject = ["sub", "client_id"]
            .iter()
            .find_map(|claim| claims.get(*claim).and_then(Value::as_str))
            .unwrap_or("unknown")
            .to_string();

        debug!(%subject, "credential verified");

        Ok(AuthContext {
            subject,
            issuer: claims.get("iss").and_then(Value::as_str).map(str::to_string),
            audience: audience_of(&claims),
            expires_at,
            claims,
        })
    }
}

/// The raw `alg` string of a credential header, read without `jsonwebtoken`.
fn declared_algorithm(credential: &str) -> Option<String> {
    let segment = credential.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    let header: Value = serde_json::from_slice(&bytes).ok()?;
    header.get("alg")?.as_str().map(str::to_string)
}

/// `aud` may be a single string or an array of strings.
fn audience_of(claims: &Map<String, Value>) -> Vec<String> {
    match claims.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// The `jsonwebtoken` algorithm for a configured `SigningAlgorithm`.
pub fn jwt_algorithm(alg: SigningAlgorithm) -> Algorithm {
    match alg {
        SigningAlgorithm::HS256 => Algorithm::HS256,
        SigningAlgorithm::HS384 => Algorithm::HS384,
        SigningAlgorithm::HS512 => Algorithm::HS512,
        SigningAlgorithm::RS256 => Algorithm::RS256,
        SigningAlgorithm::RS384 => Algorithm::RS384,
        SigningAlgorithm::RS512 => Algorithm::RS512,
        SigningAlgorithm::PS256 => Algorithm::PS256,
        SigningAlgorithm::PS384 => Algorithm::PS384,
        SigningAlgorithm::PS512 => Algorithm::PS512,
        SigningAlgorithm::ES256 => Algorithm::ES256,
        SigningAlgorithm::ES384 => Algorithm::ES384,
        SigningAlgorithm::EdDSA => Algorithm::EdDSA,
    }
}
