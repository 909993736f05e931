use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CategoryInput, DeleteQuery, ListQuery};
use super::repo_types::Category;
use super::services;
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppError,
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/challenge-categories",
            get(list_categories).post(create_category),
        )
        .route("/challenge-categories/active", get(list_active))
        .route(
            "/challenge-categories/:id",
            get(get_category)
                .put(replace_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .route("/challenge-categories/:id/restore", post(restore_category))
}

#[instrument(skip(state, viewer))]
pub async fn list_categories(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, AppError> {
    let rows = services::list(&state, viewer.as_ref(), q.include_deleted).await?;
    Ok(Json(rows))
}

pub async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(services::list_active(&state).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(services::get(&state, id).await?))
}

#[instrument(skip(state, input), fields(user_id = %principal.id))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = services::create(&state, &principal, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn replace_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(services::update(&state, &principal, id, input, false).await?))
}

pub async fn patch_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(services::update(&state, &principal, id, input, true).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<DeleteQuery>,
) -> Result<StatusCode, AppError> {
    services::destroy(&state, &principal, id, q.hard).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_category(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(services::restore(&state, Some(&principal), id).await?))
}
