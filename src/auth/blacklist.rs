use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Revoked sessions. A session stays revoked at least until `expires_at`,
/// the expiry of the refresh token that named it. Past that no token of the
/// session verifies anyway, so entries may be dropped.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    async fn revoke(&self, session_id: Uuid, user_id: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()>;
    async fn is_revoked(&self, session_id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgTokenBlacklist {
    db: PgPool,
}

impl PgTokenBlacklist {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenBlacklist for PgTokenBlacklist {
    async fn revoke(&self, session_id: Uuid, user_id: Uuid, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        let purged = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < now()")
            .execute(&self.db)
            .await
            .context("purge token_blacklist")?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "expired blacklist entries removed");
        }

        sqlx::query(
            r#"
            INSERT INTO token_blacklist (session_id, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert token_blacklist")?;
        Ok(())
    }

    async fn is_revoked(&self, session_id: Uuid) -> anyhow::Result<bool> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT session_id FROM token_blacklist WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.db)
                .await
                .context("lookup token_blacklist")?;
        Ok(found.is_some())
    }
}
