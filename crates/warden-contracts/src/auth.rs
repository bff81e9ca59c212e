//! Authenticated identity and credential rejection types.
//!
//! The identity verifier turns a bearer credential into an `AuthContext` or
//! an `AuthError`. The context lives for exactly one request and is never
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The verified identity attached to a request after credential validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    /// The `sub` claim, falling back to `client_id`, else `"unknown"`.
    pub subject: String,
    /// The `iss` claim, if the credential carried one.
    pub issuer: Option<String>,
    /// The `aud` claim normalized to a list. Empty when absent.
    pub audience: Vec<String>,
    /// Every claim in the credential, verbatim.
    pub claims: serde_json::Map<String, serde_json::Value>,
    /// When the credential stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Why a bearer credential was rejected.
///
/// Display strings are client-visible; they never include key material,
/// key-set contents, or the credential itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request carried no bearer credential.
    #[error("no bearer credential was presented")]
    Missing,

    /// The credential is not a decodable JWT or lacks a required claim.
    #[error("credential is malformed: {reason}")]
    Malformed { reason: String },

    /// The signature does not verify against the configured key material.
    #[error("credential signature is invalid")]
    InvalidSignature,

    /// The `exp` claim is not in the future.
    #[error("credential has expired")]
    Expired,

    /// The `iss` claim does not equal the configured issuer.
    #[error("credential issuer does not match the expected issuer")]
    IssuerMismatch,

    /// The `aud` claim does not contain the configured audience.
    #[error("credential audience does not match the expected audience")]
    AudienceMismatch,

    /// The credential header names an algorithm other than the pinned one.
    #[error("credential algorithm {found} does not match the pinned algorithm {expected}")]
    AlgorithmMismatch { expected: String, found: String },

    /// The credential names a key id the published key set does not contain.
    #[error("credential key '{kid}' is not in the published key set")]
    UnknownKey { kid: String },

    /// The published key set could not be fetched or used.
    ///
    /// `reason` is for operator logs only and is excluded from `Display`.
    #[error("published key set is unavailable")]
    KeySetUnavailable { reason: String },
}

impl AuthError {
    /// Stable machine-readable reason code surfaced in response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Malformed { .. } => "malformed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::AlgorithmMismatch { .. } => "algorithm_mismatch",
            AuthError::UnknownKey { .. } => "unknown_key",
            AuthError::KeySetUnavailable { .. } => "key_set_unavailable",
        }
    }

    /// True when the caller may succeed by retrying the same credential later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::KeySetUnavailable { .. })
    }
}
