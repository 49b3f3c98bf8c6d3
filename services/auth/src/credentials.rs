//! Password hashing and verification
//!
//! Hashes are Argon2 PHC strings with a fresh random salt per call, so the
//! same plaintext never produces the same hash twice.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::{Rng, distributions::Uniform};
use thiserror::Error;

/// Length of passwords generated when none is supplied
pub const GENERATED_PASSWORD_LENGTH: usize = 12;

const GENERATED_PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Error, Debug)]
#[error("failed to hash password: {0}")]
pub struct HashError(String);

/// Output of [`hash_password`]
#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub hash: String,
    /// Set when the plaintext was empty and a password was generated instead
    pub generated: Option<String>,
}

/// Hash `plaintext`, generating a random password first when it is empty
pub fn hash_password(plaintext: &str) -> Result<HashedPassword, HashError> {
    let generated = plaintext.is_empty().then(generate_password);
    let secret = generated.as_deref().unwrap_or(plaintext);

    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| HashError(e.to_string()))?
        .to_string();

    Ok(HashedPassword { hash, generated })
}

/// Check `plaintext` against a stored hash; any mismatch or malformed hash is `false`
pub fn verify_password(hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Random uppercase alphanumeric password
pub fn generate_password() -> String {
    let charset = Uniform::from(0..GENERATED_PASSWORD_CHARSET.len());
    rand::thread_rng()
        .sample_iter(charset)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(|i| GENERATED_PASSWORD_CHARSET[i] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hashed = hash_password("Secret123").unwrap();
        assert!(hashed.generated.is_none());
        assert!(verify_password(&hashed.hash, "Secret123"));
        assert!(!verify_password(&hashed.hash, "secret123"));
    }

    #[test]
    fn test_same_plaintext_gets_distinct_hashes() {
        let first = hash_password("12345678").unwrap();
        let second = hash_password("12345678").unwrap();
        assert_ne!(first.hash, second.hash);
        assert!(verify_password(&second.hash, "12345678"));
    }

    #[test]
    fn test_empty_plaintext_generates_password() {
        let hashed = hash_password("").unwrap();
        let generated = hashed.generated.expect("a password should be generated");
        assert_eq!(generated.len(), GENERATED_PASSWORD_LENGTH);
        assert!(
            generated
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
        assert!(verify_password(&hashed.hash, &generated));
        assert!(!verify_password(&hashed.hash, ""));
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", ""));
    }
}
