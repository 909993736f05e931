use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{ProfileResponse, ProfileUpdatedResponse, UpdateProfileRequest, UserWithProfile};
use super::services;
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/auth/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state), fields(user_id = %principal.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let (user, profile) = services::get(&state, &principal).await?;
    Ok(Json(ProfileResponse {
        user: UserWithProfile { user, profile },
    }))
}

#[instrument(skip(state, payload), fields(user_id = %principal.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdatedResponse>, AppError> {
    let (user, profile) = services::update(&state, &principal, payload).await?;
    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully",
        user: UserWithProfile { user, profile },
    }))
}
