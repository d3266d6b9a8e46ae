/// JWT Token Issuance and Verification
///
/// Access and refresh tokens share a claim shape but are signed with
/// independent secrets and carry independent lifetimes, so a token minted for
/// one purpose never verifies for the other.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

/// Credential pair handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKey {
    key: EncodingKey,
    expiry_seconds: i64,
}

/// Mints signed tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenIssuer {
    access: Arc<SigningKey>,
    refresh: Arc<SigningKey>,
    issuer: Arc<str>,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: Arc::new(SigningKey {
                key: EncodingKey::from_secret(config.access_secret.as_bytes()),
                expiry_seconds: config.access_token_expiry,
            }),
            refresh: Arc::new(SigningKey {
                key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
                expiry_seconds: config.refresh_token_expiry,
            }),
            issuer: Arc::from(config.issuer.as_str()),
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        self.issue(TokenPurpose::Access, user_id, email)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        self.issue(TokenPurpose::Refresh, user_id, email)
    }

    /// Sign both tokens concurrently. Either both succeed or the pair fails.
    pub async fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<Tokens, AuthError> {
        let (access_token, refresh_token) = tokio::try_join!(
            self.spawn_issue(TokenPurpose::Access, user_id, email.to_string()),
            self.spawn_issue(TokenPurpose::Refresh, user_id, email.to_string()),
        )?;

        Ok(Tokens {
            access_token,
            refresh_token,
        })
    }

    async fn spawn_issue(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
        email: String,
    ) -> Result<String, AuthError> {
        let issuer = self.clone();
        tokio::task::spawn_blocking(move || issuer.issue(purpose, user_id, &email))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, purpose = purpose.as_str(), "Signing task failed");
                AuthError::SessionPersistFailed
            })?
    }

    fn issue(
        &self,
        purpose: TokenPurpose,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, AuthError> {
        let signing = match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
        };
        let claims = Claims::new(
            user_id,
            email.to_string(),
            signing.expiry_seconds,
            self.issuer.to_string(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &signing.key).map_err(|e| {
            tracing::error!(error = %e, purpose = purpose.as_str(), "Token generation failed");
            AuthError::SessionPersistFailed
        })
    }
}

/// Checks signature, expiry and issuer of presented tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    access: Arc<DecodingKey>,
    refresh: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenVerifier {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.leeway = 0;

        Self {
            access: Arc::new(DecodingKey::from_secret(config.access_secret.as_bytes())),
            refresh: Arc::new(DecodingKey::from_secret(config.refresh_secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }

    /// Validate a token for `purpose` and return its claims.
    ///
    /// # Errors
    /// Bad signature, wrong purpose, expiry, wrong issuer, or a malformed
    /// `sub` all collapse to `InvalidToken`.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, AuthError> {
        let key = match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
        };

        let claims = decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, purpose = purpose.as_str(), "JWT validation error");
                AuthError::InvalidToken
            })?;

        claims.user_id()?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = TokenIssuer::new(&config)
            .issue_access_token(user_id, "test@example.com")
            .expect("Failed to generate token");
        let claims = TokenVerifier::new(&config)
            .verify(&token, TokenPurpose::Access)
            .expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_refresh_token(Uuid::new_v4(), "test@example.com")
            .unwrap();
        let claims = TokenVerifier::new(&config)
            .verify(&token, TokenPurpose::Refresh)
            .unwrap();

        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_token_has_three_segments() {
        let token = TokenIssuer::new(&get_test_config())
            .issue_access_token(Uuid::new_v4(), "test@example.com")
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_wrong_purpose_rejected() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let verifier = TokenVerifier::new(&config);
        let user_id = Uuid::new_v4();

        let access = issuer.issue_access_token(user_id, "a@x.com").unwrap();
        let refresh = issuer.issue_refresh_token(user_id, "a@x.com").unwrap();

        assert_eq!(
            verifier.verify(&access, TokenPurpose::Refresh).unwrap_err(),
            AuthError::InvalidToken
        );
        assert_eq!(
            verifier.verify(&refresh, TokenPurpose::Access).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn test_invalid_token() {
        let verifier = TokenVerifier::new(&get_test_config());
        let result = verifier.verify("invalid.token.here", TokenPurpose::Access);
        assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_access_token(Uuid::new_v4(), "test@example.com")
            .unwrap();

        let tampered = format!("{}X", token);
        assert!(TokenVerifier::new(&config)
            .verify(&tampered, TokenPurpose::Access)
            .is_err());
    }

    #[test]
    fn test_expired_token() {
        let mut config = get_test_config();
        config.access_token_expiry = -120;
        let token = TokenIssuer::new(&config)
            .issue_access_token(Uuid::new_v4(), "test@example.com")
            .unwrap();

        assert_eq!(
            TokenVerifier::new(&config)
                .verify(&token, TokenPurpose::Access)
                .unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config)
            .issue_access_token(Uuid::new_v4(), "test@example.com")
            .unwrap();

        config.issuer = "wrong-issuer".to_string();
        assert!(TokenVerifier::new(&config)
            .verify(&token, TokenPurpose::Access)
            .is_err());
    }

    #[tokio::test]
    async fn test_issue_pair_tokens_differ() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let user_id = Uuid::new_v4();

        let first = issuer.issue_pair(user_id, "a@x.com").await.unwrap();
        let second = issuer.issue_pair(user_id, "a@x.com").await.unwrap();

        assert_ne!(first.access_token, first.refresh_token);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_ne!(first.access_token, second.access_token);
    }
}
