//! Test credential minting for operators.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use warden_contracts::{
    config::{TrustConfig, VerificationMode},
    error::{GateError, GateResult},
};

pub const DEFAULT_SUBJECT: &str = "test-user";
pub const DEFAULT_LIFETIME_DAYS: i64 = 365;

/// Sign a credential the server configured by `trust` will accept.
///
/// Only shared-secret mode can mint; key-set mode never holds a signing key.
pub fn mint_token(trust: &TrustConfig, subject: &str, lifetime: Duration) -> GateResult<String> {
    let VerificationMode::SharedSecret { secret } = &trust.mode else {
        return Err(GateError::config(
            "tokens can only be minted in shared-secret mode",
        ));
    };

    let now = Utc::now();
    let mut claims = json!({
        "sub": subject,
        "iat": now.timestamp(),
        "exp": (now + lifetime).timestamp(),
    });
    if let Some(issuer) = &trust.issuer {
        claims["iss"] = Value::String(issuer.clone());
    }
    if let Some(audience) = &trust.audience {
        claims["aud"] = Value::String(audience.clone());
    }

    let header = Header::new(warden_auth::jwt_algorithm(trust.algorithm));
    let key = EncodingKey::from_secret(secret.expose_secret().as_bytes());
    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| GateError::config(format!("failed to sign token: {e}")))
}
