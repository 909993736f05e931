use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, HealthResponse, LoginRequest, LogoutRequest,
            MessageResponse, PublicUser, RefreshRequest, RefreshResponse, RegisterRequest,
            VerifyResponse,
        },
        extractors::AuthUser,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/token/refresh", post(refresh))
        .route("/auth/token/verify", get(verify))
        .route("/auth/change-password", post(change_password))
        .route("/auth/health", get(health))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, tokens) = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully",
            user: PublicUser::from(&user),
            tokens,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = services::login(&state, payload).await?;
    Ok(Json(AuthResponse {
        message: "Login successful",
        user: PublicUser::from(&user),
        tokens,
    }))
}

#[instrument(skip(state, payload), fields(user_id = %principal.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::logout(&state, &principal, payload.refresh_token.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: "Successfully logged out",
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let access = services::refresh(&state, &payload.refresh).await?;
    Ok(Json(RefreshResponse { access }))
}

/// The middleware already did the work; reaching here means the token is good.
pub async fn verify(AuthUser(principal): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user: principal,
    })
}

#[instrument(skip(state, payload), fields(user_id = %principal.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::change_password(&state, &principal, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Authentication service is running",
    })
}
