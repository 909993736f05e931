use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Category;
use crate::entity::{Repository, SoftDeleteRepository, View};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, icon, is_active, sort_order, \
                                created_at, updated_at, created_by, updated_by, \
                                is_deleted, deleted_at, deleted_by";

#[async_trait]
pub trait CategoryStore: SoftDeleteRepository<Category> {
    /// Uniqueness spans tombstones too; the constraint lives on the table.
    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> anyhow::Result<bool>;
    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgCategoryStore {
    db: PgPool,
}

impl PgCategoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn taken(&self, column: &str, value: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM challenge_categories \
             WHERE {column} = $1 AND ($2::uuid IS NULL OR id <> $2))"
        );
        let (exists,): (bool,) = sqlx::query_as(&sql)
            .bind(value)
            .bind(except)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("check category {column}"))?;
        Ok(exists)
    }
}

#[async_trait]
impl Repository<Category> for PgCategoryStore {
    async fn insert(&self, entity: &Category) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO challenge_categories
                (id, name, slug, description, icon, is_active, sort_order,
                 created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.slug)
        .bind(&entity.description)
        .bind(&entity.icon)
        .bind(entity.is_active)
        .bind(entity.sort_order)
        .bind(entity.audit.created_at)
        .bind(entity.audit.updated_at)
        .bind(entity.audit.created_by)
        .bind(entity.audit.updated_by)
        .execute(&self.db)
        .await
        .context("insert category")?;
        Ok(())
    }

    async fn update(&self, entity: &Category) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE challenge_categories
               SET name = $2, slug = $3, description = $4, icon = $5, is_active = $6,
                   sort_order = $7, updated_at = $8, updated_by = $9
             WHERE id = $1
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.slug)
        .bind(&entity.description)
        .bind(&entity.icon)
        .bind(entity.is_active)
        .bind(entity.sort_order)
        .bind(entity.audit.updated_at)
        .bind(entity.audit.updated_by)
        .execute(&self.db)
        .await
        .context("update category")?;
        Ok(())
    }
}

#[async_trait]
impl SoftDeleteRepository<Category> for PgCategoryStore {
    async fn write_deletion(&self, entity: &Category, restamped: bool) -> anyhow::Result<()> {
        let query = if restamped {
            sqlx::query(
                r#"
                UPDATE challenge_categories
                   SET is_deleted = $2, deleted_at = $3, deleted_by = $4,
                       updated_at = $5, updated_by = $6
                 WHERE id = $1
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE challenge_categories
                   SET is_deleted = $2, deleted_at = $3, deleted_by = $4
                 WHERE id = $1
                "#,
            )
        };
        let mut query = query
            .bind(entity.id)
            .bind(entity.deletion.is_deleted)
            .bind(entity.deletion.deleted_at)
            .bind(entity.deletion.deleted_by);
        if restamped {
            query = query
                .bind(entity.audit.updated_at)
                .bind(entity.audit.updated_by);
        }
        query
            .execute(&self.db)
            .await
            .context("write category deletion")?;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM challenge_categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete category")?;
        Ok(())
    }

    async fn find(&self, id: Uuid, view: View) -> anyhow::Result<Option<Category>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM challenge_categories \
             WHERE id = $1 AND ($2 OR NOT is_deleted)"
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(view.includes_deleted())
            .fetch_optional(&self.db)
            .await
            .context("find category")?;
        Ok(category)
    }

    async fn list(&self, view: View) -> anyhow::Result<Vec<Category>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM challenge_categories \
             WHERE ($1 OR NOT is_deleted) \
             ORDER BY sort_order, name"
        );
        let rows = sqlx::query_as::<_, Category>(&sql)
            .bind(view.includes_deleted())
            .fetch_all(&self.db)
            .await
            .context("list categories")?;
        Ok(rows)
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        self.taken("name", name, except).await
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> anyhow::Result<bool> {
        self.taken("slug", slug, except).await
    }
}
