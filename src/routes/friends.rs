//! Friend relationship routes
//!
//! - POST /api/friends/add      - admit a friend request
//! - POST /api/friends/accept   - accept a pending request
//! - POST /api/friends/deny     - deny a pending request
//! - GET  /api/friends          - friends snapshot for the live feed
//! - GET  /api/friends/requests - pending incoming requests

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{admission_error_response, json_response, text_response};
use crate::auth::session_from_headers;
use crate::friends::{
    accept_friend_request, deny_friend_request, friends_snapshot, incoming_requests_snapshot,
    submit_friend_request,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
struct AddFriendRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct FriendActionRequest {
    id: String,
}

/// A body read failure is a transport problem (400); a schema failure
/// is a malformed payload (422)
enum BodyError {
    Read(String),
    Parse,
}

async fn read_json<T: serde::de::DeserializeOwned>(body: Incoming) -> Result<T, BodyError> {
    let bytes = body
        .collect()
        .await
        .map_err(|e| BodyError::Read(e.to_string()))?
        .to_bytes();
    serde_json::from_slice(&bytes).map_err(|_| BodyError::Parse)
}

fn body_error_response(err: BodyError) -> Response<Full<Bytes>> {
    match err {
        BodyError::Read(e) => text_response(StatusCode::BAD_REQUEST, e),
        BodyError::Parse => {
            text_response(StatusCode::UNPROCESSABLE_ENTITY, "Invalid request payload")
        }
    }
}

/// Admit a friend request for the session user
pub async fn handle_add_friend(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let session = session_from_headers(&parts.headers, &state.jwt);

    let payload: AddFriendRequest = match read_json(body).await {
        Ok(payload) => payload,
        Err(e) => return body_error_response(e),
    };

    match submit_friend_request(
        state.store.as_ref(),
        state.bus.as_ref(),
        session.as_ref(),
        &payload.email,
    )
    .await
    {
        Ok(()) => text_response(StatusCode::OK, "OK"),
        Err(e) => {
            debug!(error = %e, "Friend request rejected");
            admission_error_response(e)
        }
    }
}

/// Accept a pending friend request
pub async fn handle_accept_friend(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let Some(session) = session_from_headers(&parts.headers, &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let payload: FriendActionRequest = match read_json(body).await {
        Ok(payload) => payload,
        Err(e) => return body_error_response(e),
    };

    match accept_friend_request(state.store.as_ref(), state.bus.as_ref(), &session, &payload.id)
        .await
    {
        Ok(()) => text_response(StatusCode::OK, "OK"),
        Err(e) => admission_error_response(e),
    }
}

/// Deny a pending friend request
pub async fn handle_deny_friend(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let Some(session) = session_from_headers(&parts.headers, &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let payload: FriendActionRequest = match read_json(body).await {
        Ok(payload) => payload,
        Err(e) => return body_error_response(e),
    };

    match deny_friend_request(state.store.as_ref(), &session, &payload.id).await {
        Ok(()) => text_response(StatusCode::OK, "OK"),
        Err(e) => admission_error_response(e),
    }
}

/// Friends snapshot for the session user
pub async fn handle_list_friends(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let Some(session) = session_from_headers(req.headers(), &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match friends_snapshot(state.store.as_ref(), &session.user_id).await {
        Ok(profiles) => match serde_json::to_value(&profiles) {
            Ok(value) => json_response(StatusCode::OK, &value),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => text_response(e.status_code(), e.to_string()),
    }
}

/// Pending incoming requests for the session user
pub async fn handle_list_requests(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let Some(session) = session_from_headers(req.headers(), &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    match incoming_requests_snapshot(state.store.as_ref(), &session.user_id).await {
        Ok(profiles) => match serde_json::to_value(&profiles) {
            Ok(value) => json_response(StatusCode::OK, &value),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => text_response(e.status_code(), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_read_failure_is_bad_request() {
        let response = body_error_response(BodyError::Read("connection reset".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_schema_failure_is_unprocessable() {
        let response = body_error_response(BodyError::Parse);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
