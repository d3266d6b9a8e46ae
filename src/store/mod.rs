/// User store
///
/// The only persistence the authentication core depends on. Besides plain
/// user lookups, the store owns the per-user refresh fingerprint (`hashed_rt`)
/// and must apply every fingerprint change as a single atomic statement.

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

/// A user record as seen by the authentication core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    /// Fingerprint of the one valid refresh token, `None` when signed out
    pub hashed_rt: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a new user without a session.
    ///
    /// # Errors
    /// `UniqueConstraintViolation` when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    /// Unconditionally overwrite the fingerprint
    async fn set_fingerprint(&self, id: Uuid, hashed_rt: &str) -> Result<(), StoreError>;

    /// Clear the fingerprint where it is currently set. No-op otherwise.
    async fn clear_fingerprint_if_present(&self, id: Uuid) -> Result<(), StoreError>;

    /// Replace the fingerprint only if it still equals `expected`.
    ///
    /// Returns `false` when another writer got there first.
    async fn rotate_fingerprint(
        &self,
        id: Uuid,
        expected: &str,
        hashed_rt: &str,
    ) -> Result<bool, StoreError>;

    async fn get_fingerprint(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.find_by_id(id).await?.and_then(|user| user.hashed_rt))
    }
}
