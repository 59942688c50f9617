//! Password hashing, token generation, and constant-time comparison.

use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

/// Constant-time string comparison (prevents timing attacks on token/password
/// checks).
#[must_use]
pub fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

/// Hash a password with Argon2 for at-rest storage (the HTTP surface's
/// operator password, never the wire `password` auth mode — that one is
/// compared directly against the configured plaintext via [`safe_equal`]).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(Error::from)?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2 hash produced by [`hash_password`].
#[must_use]
pub fn verify_password(password: &str, hash_str: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash_str) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a URL-safe token from a cryptographic RNG.
#[must_use]
pub fn generate_token() -> String {
    use {base64::Engine, rand::RngCore};

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// The set of tokens accepted by wire `token` auth: the configured token plus
/// any generated at runtime (e.g. via an admin token-rotation endpoint).
#[derive(Clone, Default)]
pub struct TokenSet {
    tokens: Arc<RwLock<HashSet<String>>>,
}

impl TokenSet {
    /// Seed the set from the configured token, if any.
    #[must_use]
    pub fn new(seed: Option<&str>) -> Self {
        let set = Self::default();
        if let Some(seed) = seed {
            set.insert(seed.to_string());
        }
        set
    }

    pub fn insert(&self, token: String) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token);
        }
    }

    pub fn remove(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(token);
        }
    }

    /// Whether `candidate` matches any accepted token. Every entry is
    /// compared via [`safe_equal`] rather than short-circuiting on the first
    /// `HashSet` hit, so membership isn't revealed by a length-only probe.
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        let Ok(tokens) = self.tokens.read() else {
            return false;
        };
        tokens.iter().fold(false, |found, token| {
            found | safe_equal(candidate, token)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_equal_matches_identical_strings() {
        assert!(safe_equal("abc123", "abc123"));
    }

    #[test]
    fn safe_equal_rejects_mismatched_strings() {
        assert!(!safe_equal("abc123", "abc124"));
        assert!(!safe_equal("short", "muchlonger"));
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn generate_token_is_unique_and_long() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
    }

    #[test]
    fn token_set_accepts_seed_and_runtime_additions() {
        let set = TokenSet::new(Some("seed-token"));
        assert!(set.contains("seed-token"));
        assert!(!set.contains("other-token"));

        set.insert("other-token".to_string());
        assert!(set.contains("other-token"));

        set.remove("seed-token");
        assert!(!set.contains("seed-token"));
    }

    #[test]
    fn empty_token_set_accepts_nothing() {
        let set = TokenSet::new(None);
        assert!(!set.contains(""));
        assert!(!set.contains("anything"));
    }
}
