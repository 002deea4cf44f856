use crate::AppState;
use crate::api::rfc3339;
use crate::errors::ApiError;
use crate::extract::{AUTH_COOKIE, CSRF_HEADER, CurrentUser};
use crate::metrics_defs::{LOGINS_FAILED, RATE_LIMITED};
use crate::rate_limit::client_key;
use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use easel_auth::{Claims, hash_password, issue_token, verify_password};
use easel_store::types::{User, unix_now};
use serde::{Deserialize, Serialize};
use shared::counter;
use std::net::SocketAddr;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            created_at: rfc3339(user.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub csrf_token: String,
    pub expires_in: u64,
}

pub async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_rate_limit(&state, &headers, addr)?;

    let email = normalized_email(&request.email)?;
    if request.password.chars().count() < state.auth.min_password_len {
        return Err(ApiError::Unprocessable(format!(
            "password must be at least {} characters",
            state.auth.min_password_len
        )));
    }

    let iterations = state.auth.pbkdf2_iterations;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, iterations))
        .await
        .map_err(|_| ApiError::Internal)?;

    let user = state.users.create(&email, &password_hash)?;
    tracing::info!("new account {} ({})", user.id, user.email);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_rate_limit(&state, &headers, addr)?;

    let email = normalized_email(&request.email)?;
    let user = state.users.find_by_email(&email)?;

    // Always derive a key, against the dummy hash when the email is unknown,
    // so the two rejections are indistinguishable in both body and timing.
    let encoded = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(|| state.auth.dummy_hash.clone());
    let password = request.password;
    let password_ok = tokio::task::spawn_blocking(move || verify_password(&password, &encoded))
        .await
        .map_err(|_| ApiError::Internal)?
        .unwrap_or(false);

    let Some(user) = user.filter(|_| password_ok) else {
        counter!(LOGINS_FAILED).increment(1);
        return Err(ApiError::Unauthorized("invalid email or password"));
    };

    let now = unix_now();
    let claims = Claims {
        sub: user.id,
        iat: now,
        exp: now + state.auth.token_ttl_secs,
    };
    let token = issue_token(&state.auth.jwt_secret, &claims);
    let csrf_token = state.auth.csrf.issue(user.id);

    let cookie = format!(
        "{AUTH_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        state.auth.token_ttl_secs
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            csrf_token,
            expires_in: state.auth.token_ttl_secs,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(csrf) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        state.auth.csrf.revoke(csrf);
    }

    // Expire the auth cookie; the JWT itself stays valid until its exp.
    let cookie = format!("{AUTH_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax");
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .find_by_id(user.id)?
        .ok_or(ApiError::Unauthorized("unknown user"))?;
    Ok(Json(UserResponse::from(user)))
}

fn check_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Result<(), ApiError> {
    state
        .limiter
        .check(&client_key(headers, addr))
        .map_err(|retry_after_secs| {
            counter!(RATE_LIMITED).increment(1);
            ApiError::TooManyRequests { retry_after_secs }
        })
}

fn normalized_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && !email.contains(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });

    if !valid {
        return Err(ApiError::Unprocessable("invalid email address".to_string()));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::TestServer;

    #[test]
    fn test_normalized_email() {
        assert_eq!(
            normalized_email("  User@Example.COM ").unwrap(),
            "user@example.com"
        );
        assert!(normalized_email("no-at-sign").is_err());
        assert!(normalized_email("user@nodot").is_err());
        assert!(normalized_email("@example.com").is_err());
        assert!(normalized_email("user name@example.com").is_err());
    }

    #[tokio::test]
    async fn test_signup_login_me() {
        let server = TestServer::spawn().await;

        let created: serde_json::Value = server
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({"email": "A@Example.com", "password": "correct horse"}),
            )
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(created["email"], "a@example.com");

        // Duplicate email conflicts regardless of case.
        let response = server
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({"email": "a@example.com", "password": "correct horse"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let login: serde_json::Value = server
            .post_json(
                "/api/v1/auth/login",
                &serde_json::json!({"email": "a@example.com", "password": "correct horse"}),
            )
            .await
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().unwrap();
        assert!(!login["csrf_token"].as_str().unwrap().is_empty());

        let me: serde_json::Value = server
            .client
            .get(server.url("/api/v1/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["email"], "a@example.com");
    }

    #[tokio::test]
    async fn test_login_rejections_are_uniform() {
        let server = TestServer::spawn().await;
        server.signup("a@example.com", "correct horse").await;

        let wrong_password = server
            .post_json(
                "/api/v1/auth/login",
                &serde_json::json!({"email": "a@example.com", "password": "wrong"}),
            )
            .await;
        let unknown_email = server
            .post_json(
                "/api/v1/auth/login",
                &serde_json::json!({"email": "b@example.com", "password": "wrong"}),
            )
            .await;

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

        let first: serde_json::Value = wrong_password.json().await.unwrap();
        let second: serde_json::Value = unknown_email.json().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let server = TestServer::spawn().await;
        let response = server
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({"email": "a@example.com", "password": "short"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let server = TestServer::spawn().await;

        let response = server
            .client
            .get(server.url("/api/v1/auth/me"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = server
            .client
            .get(server.url("/api/v1/auth/me"))
            .bearer_auth("not.a.token")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cookie_auth_requires_csrf_for_mutations() {
        let server = TestServer::spawn().await;
        let session = server.signup_and_login("a@example.com").await;

        // Reads with just the cookie are fine.
        let response = server
            .client
            .get(server.url("/api/v1/auth/me"))
            .header("cookie", format!("easel_token={}", session.token))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Cookie-based mutation without the CSRF header is forbidden.
        let response = server
            .client
            .post(server.url("/api/v1/projects"))
            .header("cookie", format!("easel_token={}", session.token))
            .json(&serde_json::json!({"name": "sketches"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // With the issued CSRF token it goes through.
        let response = server
            .client
            .post(server.url("/api/v1/projects"))
            .header("cookie", format!("easel_token={}", session.token))
            .header("x-csrf-token", &session.csrf_token)
            .json(&serde_json::json!({"name": "sketches"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Bearer-authenticated mutations never need CSRF.
        let response = server
            .client
            .post(server.url("/api/v1/projects"))
            .bearer_auth(&session.token)
            .json(&serde_json::json!({"name": "more"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_credential_endpoints_rate_limited() {
        let server = TestServer::spawn_with(|config| {
            config.limits.rate_limit.max_requests = 3;
            config.limits.rate_limit.window_secs = 60;
        })
        .await;

        let body = serde_json::json!({"email": "a@example.com", "password": "wrong pass"});
        for _ in 0..3 {
            let response = server.post_json("/api/v1/auth/login", &body).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = server.post_json("/api/v1/auth/login", &body).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "60");

        // Signup shares the same window for the same client.
        let response = server
            .post_json(
                "/api/v1/auth/signup",
                &serde_json::json!({"email": "b@example.com", "password": "long enough"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_logout_revokes_csrf() {
        let server = TestServer::spawn().await;
        let session = server.signup_and_login("a@example.com").await;

        let response = server
            .client
            .post(server.url("/api/v1/auth/logout"))
            .header("cookie", format!("easel_token={}", session.token))
            .header("x-csrf-token", &session.csrf_token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The revoked CSRF token no longer authorizes cookie mutations.
        let response = server
            .client
            .post(server.url("/api/v1/projects"))
            .header("cookie", format!("easel_token={}", session.token))
            .header("x-csrf-token", &session.csrf_token)
            .json(&serde_json::json!({"name": "sketches"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
