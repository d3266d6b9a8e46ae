/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. `sub` and `email` are the
/// claims clients rely on; the rest are standard registered claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token id, keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Create new claims expiring `expiry_seconds` from now
    pub fn new(user_id: Uuid, email: String, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A `sub` that is not a UUID makes the whole token invalid.
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }
}
