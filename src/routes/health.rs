//! Health and version endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::{json_response, text_response};
use crate::config::Args;
use crate::server::AppState;
use crate::store::keys;

/// Liveness check
pub fn health_check(args: &Args) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "nodeId": args.node_id.to_string(),
        }),
    )
}

/// Readiness check - probes the relation store
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    // Any read against a known key shape exercises the connection
    match state.store.get(&keys::user("readiness-probe")).await {
        Ok(_) => json_response(StatusCode::OK, &json!({ "status": "ready" })),
        Err(e) => text_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Build version
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}
