//! Session verification for Parley
//!
//! Token issuance belongs to the external auth service; Parley only
//! verifies HS256 session tokens and resolves them to a `Session`.
//! Dev mode additionally mints tokens for seeded users.

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, JwtValidator};

use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;

/// The authenticated caller, as supplied by the session collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub user_email: String,
}

/// Resolve the session from request headers, if any
pub fn session_from_headers(headers: &HeaderMap, jwt: &JwtValidator) -> Option<Session> {
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = extract_token_from_header(auth_header)?;
    let claims = jwt.verify_token(token).ok()?;
    Some(Session {
        user_id: claims.sub,
        user_email: claims.email,
    })
}
