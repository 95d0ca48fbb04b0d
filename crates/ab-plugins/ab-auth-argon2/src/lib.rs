//! # ab-auth-argon2
//!
//! Argon2id implementation of `PasswordHasher`.
//! Delete passwords are stored as PHC strings (`$argon2id$v=19$...`), each with its own salt.

use ab_core::traits::PasswordHasher;
use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// `memory_kib` and `iterations` map to Argon2's m_cost and t_cost.
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash delete password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verification reads its parameters from the stored PHC string, so
    /// hashes made with older cost settings keep verifying.
    fn verify(&self, password: &str, stored: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum legal costs keep the tests fast.
    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(Params::MIN_M_COST, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let h = hasher();
        let stored = h.hash("hunter2").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(h.verify("hunter2", &stored));
        assert!(!h.verify("hunter3", &stored));
    }

    #[test]
    fn empty_password_is_still_a_password() {
        let h = hasher();
        let stored = h.hash("").unwrap();
        assert!(h.verify("", &stored));
        assert!(!h.verify(" ", &stored));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let h = hasher();
        assert_ne!(h.hash("p").unwrap(), h.hash("p").unwrap());
    }

    #[test]
    fn garbage_stored_value_never_verifies() {
        assert!(!hasher().verify("p", "p"));
    }

    #[test]
    fn rejects_impossible_params() {
        assert!(Argon2Hasher::new(1, 0).is_err());
    }
}
