//! CSRF token registry for cookie-authenticated sessions.
//!
//! Login issues a random token tied to the user id; mutating requests that
//! authenticate via the auth cookie must present it in the `x-csrf-token`
//! header. Tokens live in a bounded TTL cache so an abandoned session costs
//! nothing after expiry. Bearer-authenticated requests never consult this.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use moka::sync::Cache;
use rand::Rng;
use std::time::Duration;

const TOKEN_BYTES: usize = 16;
const MAX_SESSIONS: u64 = 100_000;

pub struct CsrfTokens {
    tokens: Cache<String, i64>,
}

impl CsrfTokens {
    pub fn new(ttl: Duration) -> Self {
        let tokens = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_live(ttl)
            .build();

        CsrfTokens { tokens }
    }

    /// Issue a fresh token for a user. One user may hold several concurrent
    /// sessions, each with its own token.
    pub fn issue(&self, user_id: i64) -> String {
        let raw: [u8; TOKEN_BYTES] = rand::rng().random();
        let token = URL_SAFE_NO_PAD.encode(raw);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    /// True when the token exists, has not expired, and belongs to the user.
    pub fn validate(&self, token: &str, user_id: i64) -> bool {
        self.tokens.get(token) == Some(user_id)
    }

    /// Drop a token, ending its session's ability to make cookie-based
    /// mutations.
    pub fn revoke(&self, token: &str) {
        self.tokens.invalidate(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_validate_revoke() {
        let csrf = CsrfTokens::new(Duration::from_secs(60));

        let token = csrf.issue(7);
        assert!(csrf.validate(&token, 7));
        assert!(!csrf.validate(&token, 8));
        assert!(!csrf.validate("not-a-token", 7));

        csrf.revoke(&token);
        assert!(!csrf.validate(&token, 7));
    }

    #[test]
    fn test_tokens_are_unique_per_session() {
        let csrf = CsrfTokens::new(Duration::from_secs(60));
        let first = csrf.issue(7);
        let second = csrf.issue(7);
        assert_ne!(first, second);
        assert!(csrf.validate(&first, 7));
        assert!(csrf.validate(&second, 7));
    }

    #[test]
    fn test_expiry() {
        let csrf = CsrfTokens::new(Duration::from_millis(10));
        let token = csrf.issue(7);
        std::thread::sleep(Duration::from_millis(50));
        assert!(!csrf.validate(&token, 7));
    }
}
