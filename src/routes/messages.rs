//! Message send route
//!
//! - POST /api/message/send - publish a chat message to a friend

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{admission_error_response, json_response, text_response};
use crate::auth::session_from_headers;
use crate::friends::send_message;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    recipient_id: String,
    text: String,
}

/// Publish a chat message from the session user
pub async fn handle_send_message(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let Some(session) = session_from_headers(&parts.headers, &state.jwt) else {
        return text_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return text_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let payload: SendMessageRequest = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(_) => {
            return text_response(StatusCode::UNPROCESSABLE_ENTITY, "Invalid request payload")
        }
    };

    match send_message(
        state.store.as_ref(),
        state.bus.as_ref(),
        &session,
        &payload.recipient_id,
        &payload.text,
    )
    .await
    {
        Ok(message) => match serde_json::to_value(&message) {
            Ok(value) => json_response(StatusCode::OK, &value),
            Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => admission_error_response(e),
    }
}
