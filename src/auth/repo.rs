use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::entity::audit::acting_principal;
use crate::error::AppError;
use crate::profiles::repo::{insert_profile, update_profile};
use crate::profiles::repo_types::Profile;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, \
                            is_active, is_staff, date_joined, last_login";

/// Failure of a write that can collide with another account.
#[derive(Debug, thiserror::Error)]
pub enum AccountWriteError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AccountWriteError {
    /// Map a lost uniqueness race onto the same field error the pre-checks give.
    pub fn into_app_error(self, message: &str) -> AppError {
        match self {
            AccountWriteError::UsernameTaken => {
                AppError::validation(message, "username", "A user with this username already exists.")
            }
            AccountWriteError::EmailTaken => {
                AppError::validation(message, "email", "A user with this email already exists.")
            }
            AccountWriteError::Other(e) => AppError::Unexpected(e),
        }
    }

    fn from_sqlx(e: sqlx::Error, what: &'static str) -> Self {
        let constraint = e
            .as_database_error()
            .filter(|db| db.code().as_deref() == Some("23505"))
            .and_then(|db| db.constraint().map(str::to_owned));
        match constraint.as_deref() {
            Some("users_username_key") => AccountWriteError::UsernameTaken,
            Some("users_email_key") => AccountWriteError::EmailTaken,
            _ => AccountWriteError::Other(anyhow::Error::new(e).context(what)),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Create the user and its profile atomically.
    async fn create_with_profile(&self, new_user: NewUser) -> Result<(User, Profile), AccountWriteError>;
    /// Write email and names together with the already stamped profile, atomically.
    async fn update_account(&self, user: &User, profile: &Profile) -> Result<(), AccountWriteError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_where("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_where("email", email).await
    }

    async fn create_with_profile(&self, new_user: NewUser) -> Result<(User, Profile), AccountWriteError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let sql = format!(
            "INSERT INTO users (id, username, email, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AccountWriteError::from_sqlx(e, "insert user"))?;

        let mut profile = Profile::new(user.id);
        profile
            .audit
            .stamp(acting_principal(None), OffsetDateTime::now_utc());
        insert_profile(&mut *tx, &profile).await?;

        tx.commit().await.context("commit tx")?;
        Ok((user, profile))
    }

    async fn update_account(&self, user: &User, profile: &Profile) -> Result<(), AccountWriteError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        sqlx::query(
            r#"
            UPDATE users
               SET email = $2, first_name = $3, last_name = $4
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| AccountWriteError::from_sqlx(e, "update user account"))?;

        update_profile(&mut *tx, profile).await?;

        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password hash")?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await
            .context("record last login")?;
        Ok(())
    }
}
