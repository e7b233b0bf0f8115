//! RFC 6238 time-based one-time passwords.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::{AuthError, Result};

/// HMAC digest used to derive codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
}

/// A TOTP generator for one seed
#[derive(Clone)]
pub struct Totp {
    key: Vec<u8>,
    digits: u32,
    period: u64,
    algorithm: Algorithm,
}

impl Totp {
    /// Standard 6-digit, 30-second, SHA-1 generator from a base32 seed.
    pub fn from_base32(seed: &str) -> Result<Self> {
        Ok(Self {
            key: decode_base32(seed)?,
            digits: 6,
            period: 30,
            algorithm: Algorithm::Sha1,
        })
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period.max(1);
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Code for the time step containing `unix_secs`.
    pub fn generate_at(&self, unix_secs: u64) -> Result<String> {
        let counter = (unix_secs / self.period).to_be_bytes();
        let digest = match self.algorithm {
            Algorithm::Sha1 => hmac_digest::<Hmac<Sha1>>(&self.key, &counter)?,
            Algorithm::Sha256 => hmac_digest::<Hmac<Sha256>>(&self.key, &counter)?,
        };

        // Dynamic truncation
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let code = binary % 10u32.pow(self.digits);
        Ok(format!("{:0width$}", code, width = self.digits as usize))
    }

    /// Code for the current time step.
    pub fn generate_now(&self) -> Result<String> {
        self.generate_at(crate::clock::now_secs())
    }

    /// Seconds until the current code rolls over
    pub fn seconds_remaining(&self, unix_secs: u64) -> u64 {
        self.period - (unix_secs % self.period)
    }
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|e| AuthError::InvalidSeed(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Decode an RFC 4648 base32 seed, tolerating spaces, dashes, lowercase and padding.
pub fn decode_base32(seed: &str) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = seed
        .bytes()
        .filter(|b| !matches!(b, b' ' | b'-' | b'='))
        .map(|b| b.to_ascii_uppercase())
        .collect();

    if cleaned.is_empty() {
        return Err(AuthError::InvalidSeed("seed is empty".into()));
    }

    let mut out = Vec::with_capacity(cleaned.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits = 0u32;

    for ch in cleaned {
        let value = match ch {
            b'A'..=b'Z' => ch - b'A',
            b'2'..=b'7' => ch - b'2' + 26,
            other => {
                return Err(AuthError::InvalidSeed(format!(
                    "invalid base32 character '{}'",
                    other as char
                )));
            }
        };
        buffer = (buffer << 5) | value as u64;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    Ok(out)
}

/// Whether an operator-entered code has the expected shape.
pub fn is_valid_code(code: &str, digits: u32) -> bool {
    code.len() == digits as usize && code.bytes().all(|b| b.is_ascii_digit())
}
