//! Request-scoped "who is acting" slot.
//!
//! The principal is bound to the handling task with [`scope`], so it
//! disappears when the scoped future finishes, returns an error or unwinds.
//! Worker threads are shared between requests; a thread-local would not be.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub is_staff: bool,
}

tokio::task_local! {
    static CURRENT_PRINCIPAL: Option<Principal>;
}

/// The principal bound to the current request, if any.
pub fn current_principal() -> Option<Principal> {
    CURRENT_PRINCIPAL
        .try_with(|principal| principal.clone())
        .ok()
        .flatten()
}

/// Run `fut` with `principal` bound as the current principal.
pub async fn scope<F>(principal: Option<Principal>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_PRINCIPAL.scope(principal, fut).await
}
