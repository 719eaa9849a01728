use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{Principal, User},
};

/// Local mirror of identities seen from the identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the local user for `principal`, inserting it on first sight.
    ///
    /// Existing rows are never modified, so an email change at the identity
    /// provider is not mirrored. A new id whose email is already held by another
    /// row fails with `ConstraintViolation`.
    async fn ensure(&self, principal: &Principal) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ensure(&self, principal: &Principal) -> AppResult<User> {
        if principal.email.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Email is missing for the authenticated user".to_string(),
            ));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&principal.id)
        .bind(&principal.email)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from_write(e, "user email") {
            // The id conflict is absorbed above, so this is the email belonging
            // to a different local user. Rows are never rewritten.
            AppError::ConstraintViolation(_) => {
                tracing::warn!(
                    user_id = %principal.id,
                    email = %principal.email,
                    "Email already registered to another user id"
                );
                AppError::ConstraintViolation(format!(
                    "email {} is registered to another user",
                    principal.email
                ))
            }
            other => other,
        })?;

        if inserted.rows_affected() > 0 {
            tracing::info!(user_id = %principal.id, "Mirrored new user");
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(&principal.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str, email: &str) -> Principal {
        Principal {
            id: id.to_string(),
            email: email.to_string(),
        }
    }

    #[sqlx::test]
    #[ignore = "requires a running Postgres (DATABASE_URL)"]
    async fn test_ensure_inserts_once(pool: PgPool) {
        let store = PgUserStore::new(pool.clone());

        let first = store.ensure(&principal("kp_1", "a@example.com")).await.unwrap();
        let second = store.ensure(&principal("kp_1", "changed@example.com")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.email, "a@example.com");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[ignore = "requires a running Postgres (DATABASE_URL)"]
    async fn test_ensure_rejects_blank_email(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let result = store.ensure(&principal("kp_2", " ")).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[sqlx::test]
    #[ignore = "requires a running Postgres (DATABASE_URL)"]
    async fn test_ensure_email_held_by_other_id(pool: PgPool) {
        let store = PgUserStore::new(pool);
        store.ensure(&principal("kp_1", "a@example.com")).await.unwrap();

        let result = store.ensure(&principal("kp_2", "a@example.com")).await;
        match result {
            Err(AppError::ConstraintViolation(msg)) => {
                assert!(msg.contains("registered to another user"))
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }
}
