/// Secret Hashing and Verification
///
/// bcrypt hashing for every secret the server verifies without storing it in
/// the clear: account passwords and refresh-token fingerprints.
///
/// bcrypt only reads the first 72 bytes of its input. Signed refresh tokens
/// are longer than that and start with an identical header and `sub` prefix,
/// so tokens are reduced to their SHA-256 digest before bcrypt sees them.

use sha2::{Digest, Sha256};

use crate::error::{AuthError, ValidationError};

/// bcrypt input window
pub const MAX_SECRET_LENGTH: usize = 72;

/// Valid bcrypt work factors
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Plaintext behind the decoy hash; never matches a stored credential.
const DECOY_SECRET: &str = "decoy-password-for-unknown-accounts";
const DECOY_SALT: [u8; 16] = [0x5a; 16];

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a secret with a fresh random salt.
    ///
    /// # Errors
    /// Empty or oversized input is rejected before hashing.
    pub fn hash(&self, secret: &str) -> Result<String, ValidationError> {
        check_secret(secret)?;
        bcrypt::hash(secret, self.cost).map_err(|e| {
            tracing::error!(error = %e, "bcrypt hashing failed");
            ValidationError::InvalidFormat("secret")
        })
    }

    /// Constant-time verification. A malformed stored hash verifies as false.
    pub fn verify(&self, secret: &str, hashed: &str) -> bool {
        match bcrypt::verify(secret, hashed) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Stored hash could not be parsed");
                false
            }
        }
    }

    /// Fingerprint of a refresh token, suitable for storage
    pub fn fingerprint(&self, token: &str) -> Result<String, ValidationError> {
        self.hash(&token_digest(token))
    }

    pub fn verify_fingerprint(&self, token: &str, fingerprint: &str) -> bool {
        self.verify(&token_digest(token), fingerprint)
    }

    /// A well-formed hash at this hasher's cost that no real password verifies
    /// against. Checking a password for an unknown account against it costs
    /// the same as checking a wrong password for a known one.
    pub fn decoy_hash(&self) -> String {
        match bcrypt::hash_with_salt(DECOY_SECRET, self.cost, DECOY_SALT) {
            Ok(parts) => parts.format_for_version(bcrypt::Version::TwoB),
            Err(e) => {
                tracing::error!(error = %e, cost = self.cost, "Failed to build decoy hash");
                String::new()
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, secret: String) -> Result<String, AuthError> {
        let hasher = *self;
        run_blocking(move || hasher.hash(&secret)).await?.map_err(|e| {
            tracing::warn!(error = %e, "Secret rejected by hasher");
            AuthError::CreationFailed
        })
    }

    pub async fn verify_blocking(&self, secret: String, hashed: String) -> Result<bool, AuthError> {
        let hasher = *self;
        run_blocking(move || hasher.verify(&secret, &hashed)).await
    }

    pub async fn fingerprint_blocking(&self, token: String) -> Result<String, AuthError> {
        let hasher = *self;
        run_blocking(move || hasher.fingerprint(&token))
            .await?
            .map_err(|_| AuthError::SessionPersistFailed)
    }

    pub async fn verify_fingerprint_blocking(
        &self,
        token: String,
        fingerprint: String,
    ) -> Result<bool, AuthError> {
        let hasher = *self;
        run_blocking(move || hasher.verify_fingerprint(&token, &fingerprint)).await
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(10)
    }
}

fn check_secret(secret: &str) -> Result<(), ValidationError> {
    if secret.is_empty() {
        return Err(ValidationError::EmptyField("secret"));
    }
    if secret.len() > MAX_SECRET_LENGTH {
        return Err(ValidationError::TooLong("secret", MAX_SECRET_LENGTH));
    }
    Ok(())
}

fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn run_blocking<F, T>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "Hashing task failed");
        AuthError::SessionPersistFailed
    })
}
