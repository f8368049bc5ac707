//! Credential hashing for stored subjects.
//!
//! Fresh hashes are argon2id PHC strings. Rows that still carry a bcrypt hash
//! (`$2a$`, `$2b$`, `$2y$`) verify through bcrypt, so accounts created before
//! the switch keep working.

use std::sync::LazyLock;

use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Which scheme produced a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Argon2,
    Bcrypt,
}

impl HashScheme {
    pub fn of(stored: &str) -> Self {
        if BCRYPT_PREFIXES.iter().any(|p| stored.starts_with(p)) {
            Self::Bcrypt
        } else {
            Self::Argon2
        }
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hashing failed: {e}"))
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    match HashScheme::of(stored) {
        HashScheme::Bcrypt => bcrypt::verify(plain, stored).context("unreadable bcrypt hash"),
        HashScheme::Argon2 => {
            let parsed = PasswordHash::new(stored)
                .map_err(|e| anyhow::anyhow!("unreadable argon2 hash: {e}"))?;
            match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(anyhow::anyhow!("argon2 verification failed: {e}")),
            }
        }
    }
}

static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("storefront-dummy-password").unwrap_or_default());

/// A valid hash that matches no real password. Verified against when the
/// account does not exist so both paths cost one argon2 run.
pub fn dummy_hash() -> &'static str {
    &DUMMY_HASH
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn new_hashes_are_salted_argon2id() {
        let first = hash_password("pw").unwrap();
        let second = hash_password("pw").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_eq!(HashScheme::of(&first), HashScheme::Argon2);
        assert_ne!(first, second);
        assert!(verify_password("pw", &first).unwrap());
        assert!(!verify_password("pW", &first).unwrap());
    }

    #[test]
    fn bcrypt_hash_of_pw_verifies() {
        let stored = bcrypt::hash("pw", 4).unwrap();

        assert_eq!(HashScheme::of(&stored), HashScheme::Bcrypt);
        assert!(verify_password("pw", &stored).unwrap());
        assert!(!verify_password("nope", &stored).unwrap());
    }

    #[rstest]
    #[case("$2a$04$abcdefghijklmnopqrstuv", HashScheme::Bcrypt)]
    #[case("$2b$10$xyz", HashScheme::Bcrypt)]
    #[case("$2y$12$xyz", HashScheme::Bcrypt)]
    #[case("$2x$12$xyz", HashScheme::Argon2)]
    #[case("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA", HashScheme::Argon2)]
    fn scheme_detection(#[case] stored: &str, #[case] expected: HashScheme) {
        assert_eq!(HashScheme::of(stored), expected);
    }

    #[test]
    fn dummy_hash_rejects_guesses() {
        assert!(!verify_password("", dummy_hash()).unwrap());
        assert!(!verify_password("admin", dummy_hash()).unwrap());
    }

    #[rstest]
    #[case("not-a-hash")]
    #[case("$2b$10$truncated")]
    fn unreadable_hash_is_an_error(#[case] stored: &str) {
        assert!(verify_password("pw", stored).is_err());
    }
}
