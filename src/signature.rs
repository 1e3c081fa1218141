//! HMAC-SHA256 verification of webhook deliveries.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SHA256_PREFIX: &str = "sha256=";

/// Shared webhook secret, used only as the MAC key.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// How the sender encodes the signature header.
///
/// A deployment declares exactly one scheme, and both sides of the comparison
/// are taken in that form. A prefixed signature never verifies under
/// [`SignatureScheme::Bare`] and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// `sha256=<hex>`, as sent in `X-Hub-Signature-256`.
    #[default]
    Prefixed,
    /// `<hex>` with no algorithm prefix.
    Bare,
}

impl SignatureScheme {
    /// Header the sender puts the signature in, unless overridden by config.
    pub const fn default_header(self) -> &'static str {
        match self {
            Self::Prefixed => "X-Hub-Signature-256",
            Self::Bare => "X-Hub-Signature",
        }
    }

    /// Returns the hex digest part of a claimed signature, or `None` if the
    /// value is not in this scheme's form.
    fn hex_digest(self, claimed: &str) -> Option<&str> {
        match self {
            Self::Prefixed => claimed.strip_prefix(SHA256_PREFIX),
            Self::Bare => Some(claimed),
        }
    }

    fn encode(self, digest: &[u8]) -> String {
        match self {
            Self::Prefixed => format!("{SHA256_PREFIX}{}", hex::encode(digest)),
            Self::Bare => hex::encode(digest),
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefixed" => Ok(Self::Prefixed),
            "bare" => Ok(Self::Bare),
            other => Err(format!("unknown signature scheme '{other}', expected 'prefixed' or 'bare'")),
        }
    }
}

fn keyed_mac(secret: &Secret, body: &[u8]) -> Option<HmacSha256> {
    // HMAC takes keys of any length, so this only fails for a broken hash impl.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac)
}

/// Checks `claimed` against the HMAC-SHA256 of the raw `body`.
///
/// The digest comparison is constant-time. Returns `false` for an absent,
/// malformed or mismatching signature; it never panics.
pub fn verify(
    secret: &Secret,
    body: &[u8],
    claimed: Option<&str>,
    scheme: SignatureScheme,
) -> bool {
    let Some(hex_digest) = claimed.and_then(|c| scheme.hex_digest(c)) else {
        return false;
    };

    let Ok(claimed_digest) = hex::decode(hex_digest) else {
        return false;
    };

    let Some(mac) = keyed_mac(secret, body) else {
        return false;
    };

    // Rejects a wrong-length tag up front; the digest size is public.
    mac.verify_slice(&claimed_digest).is_ok()
}

/// Computes the signature header value for `body` in the given scheme.
pub fn sign(secret: &Secret, body: &[u8], scheme: SignatureScheme) -> Option<String> {
    let digest = keyed_mac(secret, body)?.finalize().into_bytes();
    Some(scheme.encode(&digest))
}
