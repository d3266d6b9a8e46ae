use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{User, UserStore};
use crate::error::StoreError;

/// `users` table backed store (see `migrations/`)
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (Uuid, String, String, Option<String>);

fn into_user((id, email, password_hash, hashed_rt): UserRow) -> User {
    User {
        id,
        email,
        password_hash,
        hashed_rt,
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, hashed_rt FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, hashed_rt FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_user))
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, hashed_rt, created_at, updated_at)
            VALUES ($1, $2, $3, NULL, $4, $4)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            hashed_rt: None,
        })
    }

    async fn set_fingerprint(&self, id: Uuid, hashed_rt: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET hashed_rt = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(hashed_rt)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn clear_fingerprint_if_present(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users SET hashed_rt = NULL, updated_at = $2
            WHERE id = $1 AND hashed_rt IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_fingerprint(
        &self,
        id: Uuid,
        expected: &str,
        hashed_rt: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET hashed_rt = $3, updated_at = $4 WHERE id = $1 AND hashed_rt = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(hashed_rt)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
