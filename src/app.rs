use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{extractors::authenticate, handlers::health};
use crate::state::AppState;
use crate::{auth, categories, profiles};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(profiles::router())
                .merge(categories::router())
                .route("/health", get(health)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{register_request, MemoryUsers, PASSWORD};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn register_body(username: &str, email: &str) -> Value {
        let r = register_request(username, email);
        json!({
            "username": r.username,
            "email": r.email,
            "first_name": r.first_name,
            "last_name": r.last_name,
            "password": r.password,
            "password_confirm": r.password_confirm,
        })
    }

    async fn register(app: &Router, username: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(register_body(username, &format!("{username}@example.com"))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["tokens"]["access"].as_str().unwrap().to_string(),
            body["tokens"]["refresh"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_endpoints() {
        let app = build_app(AppState::fake());
        for uri in ["/api/v1/health", "/api/v1/auth/health"] {
            let (status, body) = call(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
        }
    }

    #[tokio::test]
    async fn register_returns_user_and_tokens() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(register_body("newbie", "Newbie@Example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "newbie@example.com");
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["tokens"]["access"].is_string());
        assert!(body["tokens"]["refresh"].is_string());
    }

    #[tokio::test]
    async fn register_mismatch_reports_field_and_creates_nothing() {
        let app = build_app(AppState::fake());
        let mut body = register_body("mismatch", "mismatch@example.com");
        body["password"] = json!("abc12345");
        body["password_confirm"] = json!("xyz98765");

        let (status, res) = call(&app, Method::POST, "/api/v1/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(res["details"]["password_confirm"][0], "Passwords do not match.");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": "mismatch", "password": "abc12345" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_errors_are_generic() {
        let app = build_app(AppState::fake());
        register(&app, "known").await;

        let (s1, unknown) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": "nouser@example.com", "password": "whatever-pass" })),
        )
        .await;
        let (s2, wrong) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": "known@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(s1, StatusCode::BAD_REQUEST);
        assert_eq!(s1, s2);
        assert_eq!(unknown, wrong);
        assert_eq!(unknown, json!({ "error": "Invalid credentials." }));

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": "known", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "known");
    }

    #[tokio::test]
    async fn verify_requires_a_valid_bearer() {
        let app = build_app(AppState::fake());
        let (access, refresh) = register(&app, "vera").await;

        let (status, body) = call(&app, Method::GET, "/api/v1/auth/token/verify", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["user"]["username"], "vera");
        assert!(body["user"].get("is_staff").is_none());

        let (status, _) = call(&app, Method::GET, "/api/v1/auth/token/verify", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/api/v1/auth/token/verify", Some(&refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/api/v1/auth/token/verify", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_then_refresh_fails() {
        let app = build_app(AppState::fake());
        let (access, refresh) = register(&app, "leo").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/token/refresh",
            None,
            Some(json!({ "refresh": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access"].is_string());

        let (status, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(&access), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/logout",
            Some(&access),
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/token/refresh",
            None,
            Some(json!({ "refresh": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token is blacklisted");
    }

    #[tokio::test]
    async fn change_password_with_short_password_keeps_hash() {
        let users = Arc::new(MemoryUsers::default());
        let state = AppState {
            users: users.clone(),
            profiles: users.clone(),
            ..AppState::fake()
        };
        let app = build_app(state.clone());
        let (access, _) = register(&app, "chad").await;
        let user = state.users.find_by_username("chad").await.unwrap().unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/change-password",
            Some(&access),
            Some(json!({
                "old_password": PASSWORD,
                "new_password": "short",
                "new_password_confirm": "short",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["new_password"].is_array());

        let after = state.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn profile_roundtrip_through_router() {
        let app = build_app(AppState::fake());
        let (access, _) = register(&app, "paula").await;

        let (status, body) = call(&app, Method::GET, "/api/v1/auth/profile", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["profile"]["preferred_tone"], "professional");
        assert!(body["user"]["profile"].get("linkedin_access_token").is_none());

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/v1/auth/profile",
            Some(&access),
            Some(json!({ "profile": { "bio": "Runner", "website": "paula.run" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["user"]["profile"]["website"], "https://paula.run");
        assert_eq!(body["user"]["profile"]["updated_by"], body["user"]["id"]);

        let (status, _) = call(&app, Method::GET, "/api/v1/auth/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn category_lifecycle_through_router() {
        let users = Arc::new(MemoryUsers::default());
        let state = AppState {
            users: users.clone(),
            profiles: users.clone(),
            ..AppState::fake()
        };
        let app = build_app(state.clone());
        let (access, _) = register(&app, "carl").await;
        let (_, _) = register(&app, "admin").await;
        let admin = state.users.find_by_username("admin").await.unwrap().unwrap();
        users.set_staff(admin.id, true);
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": "admin", "password": PASSWORD })),
        )
        .await;
        let admin_access = body["tokens"]["access"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/challenge-categories",
            None,
            Some(json!({ "name": "fitness" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, created) = call(
            &app,
            Method::POST,
            "/api/v1/challenge-categories",
            Some(&access),
            Some(json!({ "name": "fitness" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["slug"], "fitness");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/challenge-categories/{id}"), Some(&access), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, Method::GET, &format!("/api/v1/challenge-categories/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, listed) = call(&app, Method::GET, "/api/v1/challenge-categories", None, None).await;
        assert_eq!(listed, json!([]));

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/v1/challenge-categories?include_deleted=true",
            Some(&access),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, restored) = call(
            &app,
            Method::POST,
            &format!("/api/v1/challenge-categories/{id}/restore"),
            Some(&admin_access),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restored["is_deleted"], false);
        assert_eq!(restored["updated_by"], json!(admin.id));
    }
}
