use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for user records. Email uniqueness is enforced here.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::AlreadyExists,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Insert a user; a duplicate email surfaces as `AlreadyExists`.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO user_data (email, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, display_name, password_hash
            "#,
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, password_hash
            FROM user_data
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }
}
