use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::audit::{acting_principal, Auditable, Repository};
use crate::context::Principal;

/// Tombstone fields. `is_deleted` is true exactly when `deleted_at` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DeletionMeta {
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    pub deleted_by: Option<Uuid>,
}

impl DeletionMeta {
    pub fn mark(&mut self, by: Option<Uuid>, now: OffsetDateTime) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        if by.is_some() {
            self.deleted_by = by;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Which rows a query sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Rows that are not soft-deleted.
    #[default]
    Live,
    /// Everything, tombstones included. Administrative use only.
    All,
}

impl View {
    pub fn includes_deleted(self) -> bool {
        matches!(self, View::All)
    }

    #[cfg(test)]
    pub fn admits(self, meta: &DeletionMeta) -> bool {
        self.includes_deleted() || !meta.is_deleted
    }
}

pub trait SoftDeletable: Auditable {
    fn deletion(&self) -> &DeletionMeta;
    fn deletion_mut(&mut self) -> &mut DeletionMeta;
}

#[async_trait]
pub trait SoftDeleteRepository<E>: Repository<E>
where
    E: SoftDeletable + Send + Sync,
{
    /// Write the tombstone columns. With `restamped`, `updated_by` and
    /// `updated_at` are written as well.
    async fn write_deletion(&self, entity: &E, restamped: bool) -> anyhow::Result<()>;
    /// Physically remove the row.
    async fn remove(&self, id: Uuid) -> anyhow::Result<()>;
    async fn find(&self, id: Uuid, view: View) -> anyhow::Result<Option<E>>;
    async fn list(&self, view: View) -> anyhow::Result<Vec<E>>;
}

/// Mark `entity` deleted without removing its row.
pub async fn delete<E, R>(repo: &R, entity: &mut E, by: Option<&Principal>) -> anyhow::Result<()>
where
    E: SoftDeletable + Send + Sync,
    R: SoftDeleteRepository<E> + ?Sized,
{
    let before = entity.deletion().clone();
    entity
        .deletion_mut()
        .mark(by.map(|p| p.id), OffsetDateTime::now_utc());
    if let Err(e) = repo.write_deletion(entity, false).await {
        *entity.deletion_mut() = before;
        return Err(e);
    }
    info!(id = %entity.id(), deleted_by = ?entity.deletion().deleted_by, "entity soft-deleted");
    Ok(())
}

/// Undo a soft delete, re-stamping `updated_by`/`updated_at`.
pub async fn restore<E, R>(repo: &R, entity: &mut E, by: Option<&Principal>) -> anyhow::Result<()>
where
    E: SoftDeletable + Send + Sync,
    R: SoftDeleteRepository<E> + ?Sized,
{
    let deletion_before = entity.deletion().clone();
    let audit_before = entity.audit().clone();

    entity.deletion_mut().clear();
    let audit = entity.audit_mut();
    if let Some(actor) = acting_principal(by) {
        audit.updated_by = Some(actor);
    }
    audit.updated_at = Some(OffsetDateTime::now_utc());

    if let Err(e) = repo.write_deletion(entity, true).await {
        *entity.deletion_mut() = deletion_before;
        *entity.audit_mut() = audit_before;
        return Err(e);
    }
    info!(id = %entity.id(), "entity restored");
    Ok(())
}

/// Bypass soft-delete and drop the row for good.
pub async fn hard_delete<E, R>(repo: &R, entity: E) -> anyhow::Result<()>
where
    E: SoftDeletable + Send + Sync,
    R: SoftDeleteRepository<E> + ?Sized,
{
    repo.remove(entity.id()).await?;
    info!(id = %entity.id(), "entity hard-deleted");
    Ok(())
}
