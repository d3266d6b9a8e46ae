use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{User, UserStore};
use crate::error::StoreError;

/// Process-local user store.
///
/// Every operation runs under one mutex, so each conditional update is
/// atomic with respect to the others.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Unavailable("user map lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::UniqueConstraintViolation);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            hashed_rt: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_fingerprint(&self, id: Uuid, hashed_rt: &str) -> Result<(), StoreError> {
        // Matches an UPDATE that hits zero rows: unknown ids are not an error.
        if let Some(user) = self.lock()?.get_mut(&id) {
            user.hashed_rt = Some(hashed_rt.to_string());
        }
        Ok(())
    }

    async fn clear_fingerprint_if_present(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(user) = self.lock()?.get_mut(&id) {
            user.hashed_rt = None;
        }
        Ok(())
    }

    async fn rotate_fingerprint(
        &self,
        id: Uuid,
        expected: &str,
        hashed_rt: &str,
    ) -> Result<bool, StoreError> {
        match self.lock()?.get_mut(&id) {
            Some(user) if user.hashed_rt.as_deref() == Some(expected) => {
                user.hashed_rt = Some(hashed_rt.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
