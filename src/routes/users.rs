//! User identity routes
//!
//! - GET  /api/me    - resolve the session user
//! - POST /api/users - seed a user and mint a session token (dev mode
//!   only; production identities come from the external auth service)

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{json_response, not_found_response, text_response};
use crate::auth::session_from_headers;
use crate::friends::is_valid_email;
use crate::server::AppState;
use crate::store::keys;
use crate::types::UserProfile;

/// Resolve the session user's identity and profile
pub async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let Some(session) = session_from_headers(req.headers(), &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let profile = match state.store.get(&keys::user(&session.user_id)).await {
        Ok(Some(stored)) => UserProfile::from_json(&stored).ok(),
        Ok(None) => None,
        Err(e) => return text_response(e.status_code(), e.to_string()),
    };

    let value = match profile {
        Some(profile) => json!(profile),
        None => json!({ "id": session.user_id, "email": session.user_email }),
    };
    json_response(StatusCode::OK, &value)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUserRequest {
    #[serde(default)]
    id: Option<String>,
    email: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
}

/// Seed a user profile and mint a session token (dev mode only)
pub async fn handle_register_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    if !state.args.dev_mode {
        return not_found_response(req.uri().path());
    }

    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return text_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let payload: RegisterUserRequest = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => {
            return text_response(StatusCode::UNPROCESSABLE_ENTITY, "Invalid request payload")
        }
    };

    if !is_valid_email(&payload.email) {
        return text_response(StatusCode::UNPROCESSABLE_ENTITY, "Invalid request payload");
    }

    let profile = UserProfile {
        id: payload
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        email: payload.email,
        name: payload.name,
        image: payload.image,
    };

    let stored = match profile.to_json() {
        Ok(json) => json,
        Err(e) => return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if let Err(e) = state.store.set(&keys::user(&profile.id), &stored).await {
        return text_response(e.status_code(), e.to_string());
    }
    if let Err(e) = state
        .store
        .set(&keys::user_by_email(&profile.email), &profile.id)
        .await
    {
        return text_response(e.status_code(), e.to_string());
    }

    let token = match state.jwt.generate_token(&profile.id, &profile.email) {
        Ok(token) => token,
        Err(e) => return text_response(e.status_code(), e.to_string()),
    };

    info!(user = %profile.id, "Dev user seeded");
    json_response(StatusCode::OK, &json!({ "token": token, "user": profile }))
}
