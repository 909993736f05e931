use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::{claims::TokenError, services};
use crate::{context::{self, Principal}, error::AppError, state::AppState};

/// Outcome of reading the Authorization header, stored in request extensions.
#[derive(Debug, Clone)]
pub enum Authentication {
    Anonymous,
    Authenticated(Principal),
    Rejected(String),
}

impl Authentication {
    fn principal(&self) -> Option<Principal> {
        match self {
            Authentication::Authenticated(p) => Some(p.clone()),
            _ => None,
        }
    }
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Result<Option<&str>, TokenError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| TokenError::BadScheme)?;
    // Expect "Bearer <token>"
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::BadScheme)?;
    Ok(Some(token))
}

/// Resolve the bearer token (if any) and run the rest of the stack with the
/// resulting principal bound to the request context.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = bearer_token(req.headers()).map(|t| t.map(str::to_owned));
    let auth = match token {
        Ok(None) => Authentication::Anonymous,
        Ok(Some(token)) => match services::verify_access(&state, &token).await {
            Ok(principal) => Authentication::Authenticated(principal),
            Err(AppError::Unauthorized(msg)) => {
                debug!(reason = %msg, "bearer token rejected");
                Authentication::Rejected(msg)
            }
            Err(e) => return e.into_response(),
        },
        Err(e) => Authentication::Rejected(e.to_string()),
    };

    let principal = auth.principal();
    req.extensions_mut().insert(auth);
    context::scope(principal, next.run(req)).await
}

/// Requires an authenticated principal.
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(p)) => Ok(AuthUser(p.clone())),
            Some(Authentication::Rejected(msg)) => Err(AppError::Unauthorized(msg.clone())),
            Some(Authentication::Anonymous) | None => Err(AppError::Unauthorized(
                "Authentication credentials were not provided.".into(),
            )),
        }
    }
}

/// The principal when one was authenticated; never rejects.
pub struct MaybeAuthUser(pub Option<Principal>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            parts.extensions.get::<Authentication>().and_then(Authentication::principal),
        ))
    }
}
