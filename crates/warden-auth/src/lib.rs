//! # warden-auth
//!
//! Bearer credential verification for the Warden capability server.
//!
//! [`JwtVerifier`] implements [`warden_core::traits::IdentityVerifier`] in two
//! modes, chosen by the startup `TrustConfig`:
//!
//! - **shared secret**: HMAC signatures checked against a secret of at least
//!   32 bytes;
//! - **key set**: signatures checked against a JSON Web Key Set fetched from a
//!   configured URL and cached by [`keyset::KeySetCache`].
//!
//! Either way the header algorithm must equal the pinned algorithm, `exp` must
//! be in the future, and configured issuer and audience must match exactly.

pub mod keyset;
pub mod verifier;

pub use keyset::{HttpKeySetSource, KeySetCache, KeySetSource};
pub use verifier::{jwt_algorithm, JwtVerifier};
