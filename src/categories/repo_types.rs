use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::entity::{AuditMeta, Auditable, DeletionMeta, SoftDeletable};

pub const NAME_MAX_LEN: usize = 100;
pub const SLUG_MAX_LEN: usize = 100;
pub const ICON_MAX_LEN: usize = 50;

/// Challenge category. Listed by `sort_order`, then `name`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub is_active: bool,
    pub sort_order: i32,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: AuditMeta,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub deletion: DeletionMeta,
}

impl Category {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            description: String::new(),
            icon: String::new(),
            is_active: true,
            sort_order: 0,
            audit: AuditMeta::default(),
            deletion: DeletionMeta::default(),
        }
    }
}

impl Auditable for Category {
    fn id(&self) -> Uuid {
        self.id
    }
    fn audit(&self) -> &AuditMeta {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditMeta {
        &mut self.audit
    }
}

impl SoftDeletable for Category {
    fn deletion(&self) -> &DeletionMeta {
        &self.deletion
    }
    fn deletion_mut(&mut self) -> &mut DeletionMeta {
        &mut self.deletion
    }
}
