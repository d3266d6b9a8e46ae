/// Authentication orchestrator
///
/// Sign-up, sign-in, refresh and logout over a [`UserStore`]. A user is either
/// signed out (`hashed_rt` empty) or holds exactly one valid refresh token,
/// whose fingerprint is stored. Every successful refresh replaces that
/// fingerprint, so each refresh token can be exchanged once.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{TokenIssuer, Tokens};
use crate::auth::password::PasswordHasher;
use crate::error::{AuthError, StoreError};
use crate::store::{User, UserStore};

pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    /// Checked in place of a real hash when the email is unknown
    decoy_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher, issuer: TokenIssuer) -> Self {
        Self {
            store,
            decoy_hash: hasher.decoy_hash(),
            hasher,
            issuer,
        }
    }

    /// Register a new account and open its first session.
    ///
    /// # Errors
    /// - `DuplicateEmail` if the email is registered
    /// - `CreationFailed` if the user cannot be written
    /// - `SessionPersistFailed` if the account was created but its session
    ///   could not be recorded; the account is left signed out
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;

        let user = self
            .store
            .create(email, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::UniqueConstraintViolation => AuthError::DuplicateEmail,
                StoreError::Unavailable(msg) => {
                    tracing::error!(error = %msg, "Failed to create user");
                    AuthError::CreationFailed
                }
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.start_session(&user).await
    }

    /// Exchange email and password for a new pair, superseding any session.
    ///
    /// Unknown email and wrong password are both `AccessDenied`, and both
    /// pay for one bcrypt verification.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Tokens, AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await
            .map_err(store_unavailable)?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.decoy_hash.clone(),
        };
        let valid = self
            .hasher
            .verify_blocking(password.to_string(), stored_hash)
            .await?;

        let user = match user {
            Some(user) if valid => user,
            Some(user) => {
                tracing::warn!(user_id = %user.id, "Password mismatch");
                return Err(AuthError::AccessDenied);
            }
            None => {
                tracing::warn!("Sign-in for unknown email");
                return Err(AuthError::AccessDenied);
            }
        };

        let tokens = self.start_session(&user).await?;
        tracing::info!(user_id = %user.id, "User signed in");
        Ok(tokens)
    }

    /// Rotate the session: the presented refresh token must be the one whose
    /// fingerprint is stored. On success it is permanently replaced.
    ///
    /// Signature and expiry of `refresh_token` are checked by the transport
    /// guard before this is called.
    pub async fn refresh(&self, user_id: Uuid, refresh_token: &str) -> Result<Tokens, AuthError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(store_unavailable)?
            .ok_or(AuthError::AccessDenied)?;

        let current = match user.hashed_rt.clone() {
            Some(fingerprint) => fingerprint,
            None => {
                tracing::warn!(user_id = %user_id, "Refresh without an active session");
                return Err(AuthError::AccessDenied);
            }
        };

        let matches = self
            .hasher
            .verify_fingerprint_blocking(refresh_token.to_string(), current.clone())
            .await?;
        if !matches {
            tracing::warn!(user_id = %user_id, "Refresh token does not match the active session");
            return Err(AuthError::AccessDenied);
        }

        let tokens = self.issuer.issue_pair(user.id, &user.email).await?;
        let next = self
            .hasher
            .fingerprint_blocking(tokens.refresh_token.clone())
            .await?;

        let rotated = self
            .store
            .rotate_fingerprint(user.id, &current, &next)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to rotate session");
                AuthError::SessionPersistFailed
            })?;

        if !rotated {
            // A concurrent refresh or logout changed the session after we read it.
            tracing::warn!(user_id = %user_id, "Lost refresh race");
            return Err(AuthError::AccessDenied);
        }

        tracing::info!(user_id = %user_id, "Session rotated");
        Ok(tokens)
    }

    /// End the session. Calling it without a session is fine.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store
            .clear_fingerprint_if_present(user_id)
            .await
            .map_err(store_unavailable)?;

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    async fn start_session(&self, user: &User) -> Result<Tokens, AuthError> {
        let tokens = self.issuer.issue_pair(user.id, &user.email).await?;
        let fingerprint = self
            .hasher
            .fingerprint_blocking(tokens.refresh_token.clone())
            .await?;

        self.store
            .set_fingerprint(user.id, &fingerprint)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to persist session");
                AuthError::SessionPersistFailed
            })?;

        Ok(tokens)
    }
}

fn store_unavailable(err: StoreError) -> AuthError {
    tracing::error!(error = %err, "User store failure");
    AuthError::StoreUnavailable
}
