use anyhow::Context;
use axum::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::repo_types::Profile;
use crate::entity::Repository;

const PROFILE_COLUMNS: &str = "id, user_id, bio, location, website, linkedin_profile, \
                               linkedin_access_token, linkedin_connected, preferred_tone, \
                               email_notifications, daily_reminders, \
                               created_at, updated_at, created_by, updated_by";

#[async_trait]
pub trait ProfileStore: Repository<Profile> {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;
}

/// Insert on any executor so account creation can run it inside its transaction.
pub async fn insert_profile<'e, X>(ex: X, profile: &Profile) -> anyhow::Result<()>
where
    X: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO profiles (id, user_id, bio, location, website, linkedin_profile,
                              linkedin_access_token, linkedin_connected, preferred_tone,
                              email_notifications, daily_reminders,
                              created_at, updated_at, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(profile.id)
    .bind(profile.user_id)
    .bind(&profile.bio)
    .bind(&profile.location)
    .bind(&profile.website)
    .bind(&profile.linkedin_profile)
    .bind(&profile.linkedin_access_token)
    .bind(profile.linkedin_connected)
    .bind(&profile.preferred_tone)
    .bind(profile.email_notifications)
    .bind(profile.daily_reminders)
    .bind(profile.audit.created_at)
    .bind(profile.audit.updated_at)
    .bind(profile.audit.created_by)
    .bind(profile.audit.updated_by)
    .execute(ex)
    .await
    .context("insert profile")?;
    Ok(())
}

pub async fn update_profile<'e, X>(ex: X, profile: &Profile) -> anyhow::Result<()>
where
    X: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE profiles
           SET bio = $2, location = $3, website = $4, linkedin_profile = $5,
               linkedin_access_token = $6, linkedin_connected = $7, preferred_tone = $8,
               email_notifications = $9, daily_reminders = $10,
               updated_at = $11, updated_by = $12
         WHERE id = $1
        "#,
    )
    .bind(profile.id)
    .bind(&profile.bio)
    .bind(&profile.location)
    .bind(&profile.website)
    .bind(&profile.linkedin_profile)
    .bind(&profile.linkedin_access_token)
    .bind(profile.linkedin_connected)
    .bind(&profile.preferred_tone)
    .bind(profile.email_notifications)
    .bind(profile.daily_reminders)
    .bind(profile.audit.updated_at)
    .bind(profile.audit.updated_by)
    .execute(ex)
    .await
    .context("update profile")?;
    Ok(())
}

#[derive(Clone)]
pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository<Profile> for PgProfileStore {
    async fn insert(&self, entity: &Profile) -> anyhow::Result<()> {
        insert_profile(&self.db, entity).await
    }

    async fn update(&self, entity: &Profile) -> anyhow::Result<()> {
        update_profile(&self.db, entity).await
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find profile by user")?;
        Ok(profile)
    }
}
