use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Hex characters kept from the HMAC output when rendering a nonce.
const NONCE_HEX_LENGTH: usize = 20;

/// Errors produced by the common-crypto helpers.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("nonce key must not be empty")]
    EmptyNonceKey,
    #[error("nonce lifetime must be at least 2 seconds")]
    InvalidLifetime,
    #[error("invalid HMAC key length")]
    InvalidMacKey,
}

/// MD5 over the concatenated parts, raw digest bytes encoded as standard base64.
///
/// This is the integrity hash the payment gateway expects on every request:
/// `base64(md5(proxy_key || request_number || amount))`.
pub fn proxy_hash(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Equality check whose running time does not depend on where the inputs differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// A shared secret that is wiped on drop and never printed.
#[derive(Clone, Default)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time comparison against a caller-supplied value.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.expose(), candidate)
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***redacted***")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Time-windowed action tokens.
///
/// A token is valid for the tick it was issued in and the one after it, so its
/// effective lifetime is between half and the full configured lifetime.
#[derive(Clone)]
pub struct ActionNonce {
    key: Zeroizing<Vec<u8>>,
    half_life_secs: i64,
}

impl ActionNonce {
    pub fn new(key: impl AsRef<[u8]>, lifetime_secs: u64) -> Result<Self, CryptoError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(CryptoError::EmptyNonceKey);
        }
        let half_life_secs = i64::try_from(lifetime_secs / 2).map_err(|_| CryptoError::InvalidLifetime)?;
        if half_life_secs < 1 {
            return Err(CryptoError::InvalidLifetime);
        }
        Ok(Self { key: Zeroizing::new(key.to_vec()), half_life_secs })
    }

    pub fn tick(&self, now_unix: i64) -> i64 {
        (now_unix + self.half_life_secs - 1).div_euclid(self.half_life_secs)
    }

    pub fn issue(&self, action: &str, now_unix: i64) -> Result<String, CryptoError> {
        self.token_for(self.tick(now_unix), action)
    }

    pub fn verify(&self, action: &str, token: &str, now_unix: i64) -> bool {
        let tick = self.tick(now_unix);
        [tick, tick - 1].into_iter().any(|t| {
            self.token_for(t, action)
                .map(|expected| constant_time_eq(&expected, token))
                .unwrap_or(false)
        })
    }

    fn token_for(&self, tick: i64, action: &str) -> Result<String, CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidMacKey)?;
        mac.update(tick.to_string().as_bytes());
        mac.update(b"|");
        mac.update(action.as_bytes());
        let mut token = hex::encode(mac.finalize().into_bytes());
        token.truncate(NONCE_HEX_LENGTH);
        Ok(token)
    }
}

impl std::fmt::Debug for ActionNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionNonce")
            .field("key", &"***redacted***")
            .field("half_life_secs", &self.half_life_secs)
            .finish()
    }
}
