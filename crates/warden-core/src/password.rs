/// Password hashing and verification using Argon2id
///
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Salt: 16 bytes random, stored in the PHC string
/// - Pepper: per-deployment secret fed to Argon2 as the keyed secret;
///   it never appears in the digest
///
/// Digests produced under one pepper only verify under the same pepper.
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::{Result, WardenError};

/// Password hashing configuration
///
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Deployment secret mixed into every hash; empty disables keying
    pub pepper: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            pepper: String::new(),
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl std::fmt::Debug for PasswordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordConfig")
            .field("pepper", &"<redacted>")
            .field("memory_cost", &self.memory_cost)
            .field("time_cost", &self.time_cost)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(32))
            .map_err(|e| WardenError::ConfigError(format!("Invalid Argon2 parameters: {e}")))
    }
}

/// Keyed Argon2id hasher
///
/// Cheap to clone; the blocking variants are what async callers should use.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Vec<u8>,
    params: Params,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// Build a hasher, rejecting parameter sets Argon2 does not accept
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        Ok(Self {
            pepper: config.pepper.as_bytes().to_vec(),
            params: config.to_params()?,
        })
    }

    fn argon2(&self) -> Result<Argon2<'_>> {
        if self.pepper.is_empty() {
            return Ok(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                self.params.clone(),
            ));
        }
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
        .map_err(|e| WardenError::ConfigError(format!("Invalid password pepper: {e}")))
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| WardenError::Internal(format!("Failed to hash password: {e}")))?;
        Ok(digest.to_string())
    }

    /// Check a plaintext password against a stored digest
    ///
    /// The digest's own parameters are honoured, so rows hashed under older
    /// cost settings keep verifying. Anything unparseable is a mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        match self.argon2() {
            Ok(argon2) => argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    /// [`Self::hash`] on the blocking thread pool
    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| WardenError::Internal(format!("Password hashing task failed: {e}")))?
    }

    /// [`Self::verify`] on the blocking thread pool
    pub async fn verify_blocking(&self, password: String, digest: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| WardenError::Internal(format!("Password verification task failed: {e}")))
    }
}
