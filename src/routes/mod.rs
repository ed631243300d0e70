//! HTTP routes for Parley

pub mod friends;
pub mod health;
pub mod messages;
pub mod users;

pub use friends::{
    handle_accept_friend, handle_add_friend, handle_deny_friend, handle_list_friends,
    handle_list_requests,
};
pub use health::{health_check, readiness_check, version_info};
pub use messages::handle_send_message;
pub use users::{handle_me, handle_register_user};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::friends::AdmissionError;

/// Plain-text response
pub fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.into())))
        .unwrap()
}

/// JSON response
pub fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

/// Map a protocol failure onto its status and plain-text body
pub fn admission_error_response(err: AdmissionError) -> Response<Full<Bytes>> {
    text_response(err.status_code(), err.to_string())
}

/// 404 for unmatched paths
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    text_response(StatusCode::NOT_FOUND, format!("Not found: {}", path))
}
