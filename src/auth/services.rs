//! Account and session lifecycle: register, login, verify, refresh, logout,
//! change password.

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::claims::TokenError;
use super::dto::{ChangePasswordRequest, LoginRequest, RegisterRequest};
use super::jwt::{JwtKeys, TokenPair};
use super::password::{hash_password, verify_against_dummy, verify_password};
use super::repo_types::{NewUser, User};
use super::validation;
use crate::{context::Principal, error::AppError, state::AppState};

const INVALID_CREDENTIALS: &str = "Invalid credentials.";

fn invalid_credentials() -> AppError {
    AppError::BadRequest(INVALID_CREDENTIALS.into())
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<(User, TokenPair), AppError> {
    let req = req.normalized();
    validation::validate_registration(state.users.as_ref(), &req).await?;

    let password_hash = hash_password(&req.password)?;
    let (user, profile) = state
        .users
        .create_with_profile(NewUser {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash,
        })
        .await
        .map_err(|e| e.into_app_error("Registration failed"))?;

    let tokens = JwtKeys::from_ref(state).issue_pair(user.id)?;
    info!(user_id = %user.id, profile_id = %profile.id, email = %user.email, "user registered");
    Ok((user, tokens))
}

#[instrument(skip(state, req))]
pub async fn login(state: &AppState, req: LoginRequest) -> Result<(User, TokenPair), AppError> {
    let identifier = req.username_or_email.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Both username/email and password are required.".into(),
        ));
    }

    let user = if identifier.contains('@') {
        state.users.find_by_email(&identifier.to_lowercase()).await?
    } else {
        state.users.find_by_username(identifier).await?
    };

    let Some(user) = user else {
        verify_against_dummy(&req.password);
        warn!("login unknown identifier");
        return Err(invalid_credentials());
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login inactive account");
        return Err(invalid_credentials());
    }

    let now = OffsetDateTime::now_utc();
    state.users.record_login(user.id, now).await?;
    let user = User {
        last_login: Some(now),
        ..user
    };

    let tokens = JwtKeys::from_ref(state).issue_pair(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, tokens))
}

/// Load the active owner of a token's session.
async fn session_owner(state: &AppState, user_id: uuid::Uuid, session_id: uuid::Uuid) -> Result<User, AppError> {
    if state.blacklist.is_revoked(session_id).await? {
        return Err(TokenError::Revoked.into());
    }
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(TokenError::UnknownUser)?;
    if !user.is_active {
        return Err(TokenError::InactiveUser.into());
    }
    Ok(user)
}

/// Resolve an access token to its principal.
pub async fn verify_access(state: &AppState, token: &str) -> Result<Principal, AppError> {
    let claims = JwtKeys::from_ref(state).verify_access(token)?;
    let user = session_owner(state, claims.sub, claims.sid).await?;
    Ok(user.principal())
}

/// Mint a new access token for the session named by `refresh_token`.
#[instrument(skip_all)]
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<String, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_refresh(refresh_token)?;
    let user = session_owner(state, claims.sub, claims.sid).await?;
    let access = keys.sign_access(user.id, claims.sid)?;
    info!(user_id = %user.id, session_id = %claims.sid, "access token refreshed");
    Ok(access)
}

/// Revoke the caller's session named by `refresh_token`.
#[instrument(skip(state, refresh_token), fields(user_id = %principal.id))]
pub async fn logout(state: &AppState, principal: &Principal, refresh_token: Option<&str>) -> Result<(), AppError> {
    let token = refresh_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Refresh token is required".into()))?;

    let claims = JwtKeys::from_ref(state)
        .verify_refresh(token)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if claims.sub != principal.id {
        warn!(token_owner = %claims.sub, "logout with another user's refresh token");
        return Err(AppError::BadRequest(TokenError::Invalid.to_string()));
    }
    if state.blacklist.is_revoked(claims.sid).await? {
        return Err(AppError::BadRequest(TokenError::Revoked.to_string()));
    }

    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .map_err(|e| anyhow::anyhow!("refresh token exp out of range: {e}"))?;
    state.blacklist.revoke(claims.sid, claims.sub, expires_at).await?;
    info!(session_id = %claims.sid, "user logged out");
    Ok(())
}

#[instrument(skip(state, req), fields(user_id = %principal.id))]
pub async fn change_password(
    state: &AppState,
    principal: &Principal,
    req: ChangePasswordRequest,
) -> Result<(), AppError> {
    let user = state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or(TokenError::UnknownUser)?;

    let old_password_ok =
        !req.old_password.is_empty() && verify_password(&req.old_password, &user.password_hash)?;
    let attributes = [
        ("username", user.username.as_str()),
        ("email address", user.email.as_str()),
        ("first name", user.first_name.as_str()),
        ("last name", user.last_name.as_str()),
    ];
    validation::validate_password_change(&req, old_password_ok, &attributes)?;

    let password_hash = hash_password(&req.new_password)?;
    state.users.set_password_hash(user.id, &password_hash).await?;
    info!("password changed");
    Ok(())
}
