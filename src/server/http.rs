//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::bus::EventBus;
use crate::config::Args;
use crate::routes::{self, not_found_response};
use crate::store::RelationStore;
use crate::types::ParleyError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn RelationStore>,
    pub bus: Arc<dyn EventBus>,
    pub jwt: JwtValidator,
}

impl AppState {
    pub fn new(
        args: Args,
        store: Arc<dyn RelationStore>,
        bus: Arc<dyn EventBus>,
        jwt: JwtValidator,
    ) -> Self {
        Self {
            args,
            store,
            bus,
            jwt,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), ParleyError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Parley listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - user seeding route active");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Health check endpoints
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(&state.args)
        }
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }
        (Method::GET, "/version") => routes::version_info(),

        // Friend relationship routes
        (Method::POST, "/api/friends/add") => {
            routes::handle_add_friend(req, Arc::clone(&state)).await
        }
        (Method::POST, "/api/friends/accept") => {
            routes::handle_accept_friend(req, Arc::clone(&state)).await
        }
        (Method::POST, "/api/friends/deny") => {
            routes::handle_deny_friend(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/friends") => {
            routes::handle_list_friends(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/friends/requests") => {
            routes::handle_list_requests(req, Arc::clone(&state)).await
        }

        // Messaging
        (Method::POST, "/api/message/send") => {
            routes::handle_send_message(req, Arc::clone(&state)).await
        }

        // Identity
        (Method::GET, "/api/me") => routes::handle_me(req, Arc::clone(&state)).await,
        (Method::POST, "/api/users") => {
            routes::handle_register_user(req, Arc::clone(&state)).await
        }

        (_, p) => not_found_response(p),
    };

    Ok(response)
}
