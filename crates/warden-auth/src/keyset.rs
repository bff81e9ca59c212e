//! Published key-set retrieval and caching.
//!
//! `KeySetCache` keeps the last fetched JSON Web Key Set behind an `RwLock`
//! that is held only long enough to clone or swap an `Arc`. Fetching happens
//! with no lock held, so a slow key-set endpoint never blocks requests that
//! can be served from the cached set.
//!
//! Refresh policy:
//! - the cached set is reused until it is older than the configured refresh
//!   interval, then refetched on the next lookup;
//! - a `kid` missing from the cached set triggers one refetch, but only if the
//!   cached set is older than `min_refetch`, so a stream of credentials with
//!   bogus key ids cannot turn into a stream of fetches;
//! - a failed fetch is reported as `KeySetUnavailable` and is not retried
//!   within the same lookup.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::{
    jwk::{Jwk, JwkSet},
    DecodingKey,
};
use tracing::{debug, info, warn};

use warden_contracts::{
    auth::AuthError,
    error::{GateError, GateResult},
};

/// Minimum age of the cached set before an unknown `kid` may force a refetch.
pub const DEFAULT_MIN_REFETCH: Duration = Duration::from_secs(10);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a key set comes from.
///
/// The error string is for operator logs only; it is never shown to clients.
pub trait KeySetSource: Send + Sync {
    fn fetch(&self) -> Result<JwkSet, String>;
}

/// Fetches a key set over HTTP(S) with a blocking client.
///
/// Construct this outside any async runtime; it owns a `reqwest` blocking
/// client.
pub struct HttpKeySetSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>) -> GateResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| GateError::config(format!("failed to build key-set HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl KeySetSource for HttpKeySetSource {
    fn fetch(&self) -> Result<JwkSet, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| format!("request to {} failed: {e}", self.url))?;
        response
            .json::<JwkSet>()
            .map_err(|e| format!("response from {} is not a key set: {e}", self.url))
    }
}

struct Snapshot {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Time-bounded cache over a `KeySetSource`.
pub struct KeySetCache {
    source: Box<dyn KeySetSource>,
    refresh: Duration,
    min_refetch: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl KeySetCache {
    pub fn new(source: Box<dyn KeySetSource>, refresh: Duration) -> Self {
        Self {
            source,
            refresh,
            min_refetch: DEFAULT_MIN_REFETCH,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_min_refetch(mut self, min_refetch: Duration) -> Self {
        self.min_refetch = min_refetch;
        self
    }

    /// Decoding key for `kid`.
    ///
    /// A credential without a `kid` is accepted only when the set holds
    /// exactly one key.
    pub fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        let (keys, fetched_at, fresh) = match self.cached() {
            Some((keys, fetched_at)) if fetched_at.elapsed() < self.refresh => {
                (keys, fetched_at, false)
            }
            _ => (self.fetch()?, Instant::now(), true),
        };

        if let Some(jwk) = select(&keys, kid) {
            return decoding_key(jwk);
        }

        if fresh || fetched_at.elapsed() < self.min_refetch {
            return Err(unknown_key(kid));
        }

        debug!(kid = kid.unwrap_or_default(), "key id not cached, refetching key set");
        let keys = self.fetch()?;
        match select(&keys, kid) {
            Some(jwk) => decoding_key(jwk),
            None => Err(unknown_key(kid)),
        }
    }

    fn cached(&self) -> Option<(Arc<JwkSet>, Instant)> {
        // A poisoned lock still holds a usable snapshot.
        let guard = self.snapshot.read().unwrap_or_else(|p| p.into_inner());
        guard
            .as_ref()
            .map(|s| (Arc::clone(&s.keys), s.fetched_at))
    }

    fn fetch(&self) -> Result<Arc<JwkSet>, AuthError> {
        let keys = match self.source.fetch() {
            Ok(keys) => Arc::new(keys),
            Err(reason) => {
                warn!(%reason, "key-set fetch failed");
                return Err(AuthError::KeySetUnavailable { reason });
            }
        };
        info!(key_count = keys.keys.len(), "key set refreshed");

        let mut guard = self.snapshot.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Snapshot {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}

fn select<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    DecodingKey::from_jwk(jwk).map_err(|e| AuthError::KeySetUnavailable {
        reason: format!("published key is unusable: {e}"),
    })
}

fn unknown_key(kid: Option<&str>) -> AuthError {
    AuthError::UnknownKey {
        kid: kid.unwrap_or("(none)").to_string(),
    }
}
