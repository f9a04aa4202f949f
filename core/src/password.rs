use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a share-link password for storage. Plaintext is never persisted.
pub fn generate_password_hash(password: &str) -> Result<String> {
    let mut rng = OsRng;
    let salt = SaltString::generate(&mut rng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a candidate password against a stored hash. A malformed stored
/// hash is an infrastructure fault, not a mismatch.
pub fn verify_password_hash(stored_hash: &str, candidate: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(stored_hash).map_err(|err| anyhow!("invalid stored hash: {err}"))?;

    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = generate_password_hash("hunter2-but-longer").unwrap();
        assert!(verify_password_hash(&hash, "hunter2-but-longer").unwrap());
        assert!(!verify_password_hash(&hash, "wrong").unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password_hash("not-a-phc-string", "anything").is_err());
    }
}
