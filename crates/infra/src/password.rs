//! Password hashing for admin accounts.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

/// One-way credential hashing.
pub trait CredentialHasher: Send + Sync {
    /// Produce a self-describing (PHC) hash string.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// `false` for a wrong password and for an unparsable hash alike.
    fn verify(&self, hash: &str, password: &str) -> bool;
}

/// Argon2id with default parameters and a random 16-byte salt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| HashError(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError(e.to_string()))?;
        let phc = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashError(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    fn verify(&self, hash: &str, password: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_hashed_password() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify(&hash, "hunter2"));
        assert!(!hasher.verify(&hash, "hunter3"));
    }

    #[test]
    fn salts_differ() {
        let hasher = Argon2Hasher;
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!Argon2Hasher.verify("not-a-phc-string", "anything"));
    }
}
