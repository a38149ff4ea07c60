use anyhow::anyhow;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Argon2id PHC string with a fresh salt from the OS RNG.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("argon2 hashing failed: {e}"))
}

/// `Ok(false)` only for a genuine mismatch. A stored value that is not a
/// PHC string, or that uses parameters the verifier rejects, is an `Err`.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("stored password hash unreadable: {e}"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("argon2 verification failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_and_verifies() {
        let hash = hash_password("p1").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("p1", &hash).expect("verify"));
    }

    #[test]
    fn mismatch_is_false_not_error() {
        let hash = hash_password("correct-horse-battery-staple").expect("hash");
        assert!(!verify_password("wrong-password", &hash).expect("mismatch is not an error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn unreadable_stored_value_is_an_error() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(err.to_string().contains("unreadable"));
    }

    #[test]
    fn foreign_algorithm_in_stored_value_is_an_error() {
        // A well-formed PHC string naming an algorithm Argon2 does not handle.
        let stored = "$pbkdf2-sha256$i=1000$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaGhhc2g";
        assert!(verify_password("anything", stored).is_err());
    }
}
