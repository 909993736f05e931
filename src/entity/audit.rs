use axum::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::context::{self, Principal};

/// Creation/update bookkeeping embedded in every persisted entity.
///
/// `created_at` is `None` until the first successful persist; that is how a
/// record "without identity yet" is told apart from a stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct AuditMeta {
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl AuditMeta {
    pub fn is_persisted(&self) -> bool {
        self.created_at.is_some()
    }

    /// Record a persist at `now` by `actor`.
    pub fn stamp(&mut self, actor: Option<Uuid>, now: OffsetDateTime) {
        let creating = !self.is_persisted();
        if creating {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
        if let Some(actor) = actor {
            if creating {
                self.created_by = Some(actor);
            }
            self.updated_by = Some(actor);
        }
    }
}

/// Anything carrying an [`AuditMeta`].
pub trait Auditable {
    fn id(&self) -> Uuid;
    fn audit(&self) -> &AuditMeta;
    fn audit_mut(&mut self) -> &mut AuditMeta;
}

/// Explicit principal first, then whoever is bound to the current request.
pub fn acting_principal(explicit: Option<&Principal>) -> Option<Uuid> {
    explicit
        .map(|p| p.id)
        .or_else(|| context::current_principal().map(|p| p.id))
}

/// Storage for one auditable entity type. Implementations write rows as
/// given; stamping happens in [`save`].
#[async_trait]
pub trait Repository<E>: Send + Sync
where
    E: Auditable + Send + Sync,
{
    async fn insert(&self, entity: &E) -> anyhow::Result<()>;
    async fn update(&self, entity: &E) -> anyhow::Result<()>;
}

/// Persist `entity`, stamping its audit fields on the way.
///
/// On failure the in-memory audit fields are rolled back so a record that
/// never reached storage is still treated as new.
pub async fn save<E, R>(repo: &R, entity: &mut E, actor: Option<&Principal>) -> anyhow::Result<()>
where
    E: Auditable + Send + Sync,
    R: Repository<E> + ?Sized,
{
    let before = entity.audit().clone();
    let creating = !before.is_persisted();
    let actor = acting_principal(actor);
    entity.audit_mut().stamp(actor, OffsetDateTime::now_utc());

    let result = if creating {
        repo.insert(entity).await
    } else {
        repo.update(entity).await
    };

    match result {
        Ok(()) => {
            debug!(id = %entity.id(), creating, actor = ?actor, "entity saved");
            Ok(())
        }
        Err(e) => {
            *entity.audit_mut() = before;
            Err(e)
        }
    }
}
