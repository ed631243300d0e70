//! Friend relationship protocol
//!
//! Server-side admission of friend requests plus the accept/deny and
//! message-send operations layered on the same store/bus seams. Every
//! failure is terminal and surfaced synchronously; the service never
//! retries. Durable state is the store's per-key sets; bus events are
//! best-effort live hints published *before* the persisting write, an
//! accepted weak-consistency trade-off (subscribers re-derive state from
//! explicit fetches, not from event payloads).

pub mod admission;
pub mod relations;

pub use admission::{is_valid_email, submit_friend_request};
pub use relations::{
    accept_friend_request, deny_friend_request, friends_snapshot, incoming_requests_snapshot,
    send_message,
};

use hyper::StatusCode;

use crate::types::ParleyError;

/// Failure taxonomy of the relationship protocol
///
/// Status mapping follows the external interface: schema/syntax failures
/// are 422, a missing session is 401, and every other rejected request
/// is a plain 400 with a human-readable body.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// Malformed input (bad email syntax, empty message text)
    #[error("{0}")]
    Validation(&'static str),

    /// No valid session, or the caller is not allowed this operation
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Target does not exist (unknown email, missing profile, no
    /// pending request)
    #[error("{0}")]
    NotFound(&'static str),

    /// Self-targeting request
    #[error("{0}")]
    InvalidRequest(&'static str),

    /// Duplicate request or already-related users
    #[error("{0}")]
    Conflict(&'static str),

    /// Store or bus failure
    #[error(transparent)]
    Backend(#[from] ParleyError),
}

impl AdmissionError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Backend(inner) => inner.status_code(),
        }
    }
}
