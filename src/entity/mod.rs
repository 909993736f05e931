//! Shared record metadata: audit columns and soft delete.

pub mod audit;
pub mod soft_delete;

pub use audit::{save, AuditMeta, Auditable, Repository};
pub use soft_delete::{DeletionMeta, SoftDeletable, SoftDeleteRepository, View};
