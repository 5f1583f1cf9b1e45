//! Salted password hashing for stored credentials.
//!
//! # Responsibility
//! - Derive PBKDF2-HMAC-SHA256 hashes with a random per-user salt.
//! - Verify a candidate password against an encoded hash in constant time.
//!
//! # Invariants
//! - Encoded form is `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
//! - Verification uses the iteration count stored in the hash, so the
//!   default can change without invalidating existing accounts.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::error::Error;
use std::fmt::{Display, Formatter};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Iteration count used for newly registered accounts.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Failure to interpret a stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedHash(pub &'static str);

impl Display for MalformedHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed password hash: {}", self.0)
    }
}

impl Error for MalformedHash {}

/// Hashes and verifies passwords with a fixed iteration count.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    /// Creates a hasher; an iteration count of zero is raised to one.
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hashes `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let derived = pbkdf2_sha256(password.as_bytes(), &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(derived)
        )
    }

    /// Returns whether `password` matches the encoded hash.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, MalformedHash> {
        let mut parts = encoded.split('$');
        let scheme = parts.next().ok_or(MalformedHash("missing scheme"))?;
        if scheme != SCHEME {
            return Err(MalformedHash("unknown scheme"));
        }
        let iterations = parts
            .next()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .ok_or(MalformedHash("invalid iteration count"))?;
        let salt = parts
            .next()
            .and_then(|value| hex::decode(value).ok())
            .ok_or(MalformedHash("invalid salt"))?;
        let expected = parts
            .next()
            .and_then(|value| hex::decode(value).ok())
            .filter(|value| value.len() == HASH_LEN)
            .ok_or(MalformedHash("invalid digest"))?;
        if parts.next().is_some() {
            return Err(MalformedHash("trailing fields"));
        }

        let derived = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
        Ok(bool::from(derived.as_slice().ct_eq(expected.as_slice())))
    }
}

/// PBKDF2 with HMAC-SHA256, single output block (dkLen == hLen).
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    // HMAC accepts keys of any length, so keying cannot fail.
    let keyed = match HmacSha256::new_from_slice(password) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };

    let mut mac = keyed.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut block = mac.finalize().into_bytes();

    let mut derived = [0u8; HASH_LEN];
    derived.copy_from_slice(&block);
    for _ in 1..iterations {
        let mut mac = keyed.clone();
        mac.update(&block);
        block = mac.finalize().into_bytes();
        for (out, byte) in derived.iter_mut().zip(block.iter()) {
            *out ^= byte;
        }
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::{pbkdf2_sha256, MalformedHash, PasswordHasher};

    #[test]
    fn pbkdf2_matches_rfc7914_vector() {
        let derived = pbkdf2_sha256(b"passwd", b"salt", 1);
        assert_eq!(
            hex::encode(derived),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn hash_then_verify_accepts_only_the_original_password() {
        let hasher = PasswordHasher::new(10);
        let encoded = hasher.hash("pw1");
        assert!(encoded.starts_with("pbkdf2-sha256$10$"));
        assert!(hasher.verify("pw1", &encoded).unwrap());
        assert!(!hasher.verify("pw2", &encoded).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = PasswordHasher::new(5);
        assert_ne!(hasher.hash("same"), hasher.hash("same"));
    }

    #[test]
    fn verify_uses_stored_iteration_count() {
        let encoded = PasswordHasher::new(3).hash("secret");
        assert!(PasswordHasher::new(99).verify("secret", &encoded).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hashes() {
        let hasher = PasswordHasher::new(1);
        assert_eq!(
            hasher.verify("x", "plaintext").unwrap_err(),
            MalformedHash("unknown scheme")
        );
        assert!(hasher.verify("x", "pbkdf2-sha256$0$00$00").is_err());
        assert!(hasher.verify("x", "pbkdf2-sha256$1$zz$00").is_err());
    }
}
