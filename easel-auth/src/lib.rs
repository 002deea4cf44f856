//! Credentials and tokens for the easel API.
//!
//! Three independent pieces: salted PBKDF2 password hashing, HS256 JWTs for
//! stateless request authentication, and an in-process CSRF token registry
//! for cookie-authenticated sessions.

pub mod csrf;
pub mod password;
pub mod tokens;

pub use csrf::CsrfTokens;
pub use password::{PasswordError, hash_password, verify_password};
pub use tokens::{Claims, TokenError, issue_token, verify_token};
