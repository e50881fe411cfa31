use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RefreshStore, SessionStore, UserStore};
use crate::domain::{LoginRecord, NewUser, RefreshCredential, User};
use crate::error::{AppError, AuthError};

/// Postgres-backed store over the `users` and `refresh_credentials` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, role, status, image,
                   last_login_at, last_login_ip, login_count, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, role, status, image,
                   last_login_at, last_login_ip, login_count, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, role, status, image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id, email, name, password_hash, role, status, image,
                      last_login_at, last_login_ip, login_count, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.status)
        .bind(&user.image)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl RefreshStore for PgStore {
    async fn find_refresh_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshCredential>, AppError> {
        let credential = sqlx::query_as::<_, RefreshCredential>(
            r#"
            SELECT user_id, token_hash, created_at, expires_at
            FROM refresh_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn delete_refresh_credential(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn establish_session(
        &self,
        credential: RefreshCredential,
        login: LoginRecord,
    ) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        // Updating the user row first takes its row lock, which serializes
        // concurrent logins of the same account through the delete+insert below.
        // The status condition makes a suspension committed since the caller's
        // check win over this login.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET status = 'Active',
                last_login_at = $2,
                last_login_ip = $3,
                login_count = login_count + 1,
                updated_at = $2
            WHERE id = $1 AND status IN ('Active', 'Inactive')
            RETURNING id, email, name, password_hash, role, status, image,
                      last_login_at, last_login_ip, login_count, created_at, updated_at
            "#,
        )
        .bind(credential.user_id)
        .bind(login.at)
        .bind(&login.ip)
        .fetch_optional(&mut tx)
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)",
                )
                .bind(credential.user_id)
                .fetch_one(&mut tx)
                .await?;
                tx.rollback().await?;

                return Err(AppError::Auth(if exists {
                    AuthError::AccountInactive
                } else {
                    AuthError::InvalidCredentials
                }));
            }
        };

        sqlx::query("DELETE FROM refresh_credentials WHERE user_id = $1")
            .bind(credential.user_id)
            .execute(&mut tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO refresh_credentials (user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(credential.user_id)
        .bind(&credential.token_hash)
        .bind(credential.created_at)
        .bind(credential.expires_at)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    async fn end_session(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM refresh_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut tx)
            .await?;

        // Suspended or pending accounts keep their status
        sqlx::query(
            r#"
            UPDATE users
            SET status = 'Inactive', updated_at = $2
            WHERE id = $1 AND status = 'Active'
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
