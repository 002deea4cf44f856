//! Request authentication.
//!
//! Tokens are accepted from the `Authorization: Bearer` header or the auth
//! cookie. Cookie-authenticated mutations must additionally present the CSRF
//! token issued at login; bearer clients are exempt, since a cross-site
//! attacker cannot set that header.

use crate::AppState;
use crate::errors::ApiError;
use crate::metrics_defs::TOKENS_REJECTED;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, Method, header, request::Parts};
use easel_store::types::unix_now;
use shared::counter;

pub const AUTH_COOKIE: &str = "easel_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The authenticated caller, resolved from the request credentials.
pub struct CurrentUser {
    pub id: i64,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (token, via_cookie) = match bearer_token(&parts.headers) {
            Some(token) => (token, false),
            None => {
                let token = cookie_value(&parts.headers, AUTH_COOKIE)
                    .ok_or(ApiError::Unauthorized("missing credentials"))?;
                (token, true)
            }
        };

        let claims = easel_auth::verify_token(&state.auth.jwt_secret, &token, unix_now())
            .map_err(|err| {
                counter!(TOKENS_REJECTED).increment(1);
                tracing::debug!("rejected token: {err}");
                ApiError::Unauthorized("invalid or expired token")
            })?;

        if via_cookie && is_mutating(&parts.method) {
            let csrf = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok())
                .ok_or(ApiError::Forbidden("missing csrf token"))?;

            if !state.auth.csrf.validate(csrf, claims.sub) {
                return Err(ApiError::Forbidden("invalid csrf token"));
            }
        }

        Ok(CurrentUser { id: claims.sub })
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(cookie_value(&headers, AUTH_COOKIE), None);

        headers.insert(
            header::COOKIE,
            "theme=dark; easel_token=tok123; other=1".parse().unwrap(),
        );
        assert_eq!(
            cookie_value(&headers, AUTH_COOKIE),
            Some("tok123".to_string())
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_is_mutating() {
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::DELETE));
    }
}
