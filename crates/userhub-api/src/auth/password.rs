/// Password hashing and verification using Argon2id
///
/// The credential verifier hashes a plaintext password once, at account
/// creation (or password change), and checks it once per login attempt:
/// - Algorithm: Argon2id v19
/// - Memory: 19 MiB
/// - Iterations: 2
/// - Parallelism: 1 lane
/// - Salt: 16 bytes random
/// - Output: 32 bytes hash
///
/// Both operations are CPU-bound and deliberately slow; async callers run
/// them on the blocking thread pool.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("{0}")]
    TooWeak(&'static str),
}

/// Argon2 cost parameters
///
/// The default is the OWASP Argon2id baseline. Stored hashes carry their own
/// parameters, so changing this only affects newly created hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 2)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 1)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheapest parameters Argon2 accepts; for tests only
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hashes and checks account passwords
#[derive(Debug, Clone, Default)]
pub struct CredentialVerifier {
    config: PasswordConfig,
}

impl CredentialVerifier {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PasswordConfig {
        &self.config
    }

    /// Hash a plaintext password into a PHC string (algorithm, parameters,
    /// salt and digest in one value, safe to store as-is)
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.config.to_params()?);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Check a plaintext password against a stored PHC string.
    ///
    /// Returns `Ok(false)` on mismatch; errors only when the stored hash
    /// cannot be parsed or verification itself fails.
    pub fn matches(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        // Parameters come from the PHC string, not from `self.config`
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }

    /// Hash on the blocking thread pool
    pub async fn hash_blocking(&self, password: String) -> Result<String, PasswordError> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    /// Verify on the blocking thread pool
    pub async fn matches_blocking(
        &self,
        password: String,
        hash: String,
    ) -> Result<bool, PasswordError> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.matches(&password, &hash))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
    }
}

/// Validate password strength
///
/// Requires at least 8 characters including at least one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < 8 {
        return Err(PasswordError::TooWeak(
            "Password must be at least 8 characters long",
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(PasswordError::TooWeak(
            "Password must contain at least one letter and one number",
        ));
    }

    Ok(())
}
