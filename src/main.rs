//! Parley - friend-request admission and live chat notification gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley::{
    auth::JwtValidator,
    bus::{EventBus, MemoryBus, NatsBus},
    config::Args,
    server,
    store::{MemoryStore, RedisStore, RelationStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("parley={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Parley - Friends & Chat Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Redis: {}", args.redis_url);
    info!("NATS: {}", args.nats.nats_url);
    info!("======================================");

    // Connect to Redis (memory fallback in dev mode)
    let store: Arc<dyn RelationStore> = match RedisStore::connect(&args.redis_url).await {
        Ok(store) => {
            info!("Redis connected successfully");
            Arc::new(store)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("Redis connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryStore::new())
            } else {
                error!("Redis connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Connect to NATS (memory fallback in dev mode)
    let bus: Arc<dyn EventBus> =
        match NatsBus::connect(&args.nats, &format!("parley-{}", args.node_id)).await {
            Ok(bus) => {
                info!("NATS connected successfully");
                Arc::new(bus)
            }
            Err(e) => {
                if args.dev_mode {
                    warn!("NATS connection failed (dev mode, using in-memory bus): {}", e);
                    Arc::new(MemoryBus::new())
                } else {
                    error!("NATS connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    // Session token validator
    let jwt = if args.dev_mode && args.jwt_secret.is_none() {
        warn!("No JWT_SECRET set (dev mode, using local default)");
        JwtValidator::new_dev()
    } else {
        match JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds) {
            Ok(jwt) => jwt,
            Err(e) => {
                error!("JWT configuration error: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state and run the server
    let state = Arc::new(server::AppState::new(args, store, bus, jwt));
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
