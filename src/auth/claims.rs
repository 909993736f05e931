use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Access")]
    Access,
    #[serde(alias = "Refresh")]
    Refresh,
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub sid: Uuid,       // session ID, shared by a refresh token and its access tokens
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
}

/// Why a bearer or refresh token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid Authorization header")]
    BadScheme,
    #[error("Token is invalid or expired")]
    Invalid,
    #[error("Token is invalid or expired")]
    Expired,
    #[error("Token has wrong type")]
    WrongKind,
    #[error("Token is blacklisted")]
    Revoked,
    #[error("User not found")]
    UnknownUser,
    #[error("User is inactive")]
    InactiveUser,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}
