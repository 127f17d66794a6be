use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::config::PasswordConfig;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("password verification failed: {0}")]
    Verification(String),
}

/// One-way password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// `Ok(false)` is a plain mismatch; `Err` means the stored hash is unusable.
    fn verify(&self, hash: &str, password: &str) -> Result<bool, HashError>;

    /// A valid hash at the configured cost that no login password matches.
    /// Verifying against it costs the same as verifying a real account.
    fn dummy_hash(&self) -> &str;
}

#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    dummy_hash: String,
}

impl Argon2Hasher {
    pub fn new(config: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let salt = SaltString::generate(&mut OsRng);
        hasher.dummy_hash = hasher
            .argon2()
            .hash_password(&secret, &salt)
            .map_err(|e| anyhow::anyhow!("argon2 dummy hash: {e}"))?
            .to_string();
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError::Hashing(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            HashError::Verification(e.to_string())
        })?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(HashError::Verification(e.to_string()))
            }
        }
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("test params are valid")
}
