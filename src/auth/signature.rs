//! HMAC-SHA256 signature generation for Phemex WebSocket authentication.
//!
//! The `user.auth` request carries a signature computed as:
//! ```text
//! hex(HMAC-SHA256(api_secret, api_key + expiry))
//! ```
//!
//! where `expiry` is a whole-second Unix timestamp rendered in decimal,
//! concatenated to the key with no separator.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::auth::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Sign an identity and expiry with the given secret.
///
/// Deterministic and side-effect free. The output is the lowercase hex
/// encoding of the 32-byte digest.
///
/// # Example
///
/// ```rust
/// use phemex_streamer::auth::sign;
///
/// let signature = sign("api_key", "api_secret", 1_700_000_120);
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign(identity: &str, secret: &str, expiry: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(identity.as_bytes());
    mac.update(expiry.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Compute the expiry timestamp for an auth request created now.
///
/// Saturates at `i64::MAX` for windows too large to represent.
pub fn auth_expiry(window: Duration) -> i64 {
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    OffsetDateTime::now_utc().unix_timestamp().saturating_add(window)
}

/// The signed values carried by one `user.auth` request.
///
/// Built fresh for every authentication attempt; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    /// The API key.
    pub identity: String,
    /// Hex-encoded signature over `identity + expiry`.
    pub signature: String,
    /// Unix timestamp (seconds) after which the request is stale.
    pub expiry: i64,
}

impl AuthPayload {
    /// Build a payload that expires `window` from now.
    pub fn new(credentials: &Credentials, window: Duration) -> Self {
        Self::with_expiry(credentials, auth_expiry(window))
    }

    /// Build a payload for a fixed expiry.
    pub fn with_expiry(credentials: &Credentials, expiry: i64) -> Self {
        Self {
            identity: credentials.api_key.clone(),
            signature: sign(&credentials.api_key, credentials.expose_secret(), expiry),
            expiry,
        }
    }
}
