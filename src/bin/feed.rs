//! parley-feed - terminal live feed client
//!
//! Connects to a Parley gateway with a session token, subscribes to the
//! session user's channels, and renders the live peer list with unseen
//! counts. Commands:
//!
//! - `open <peer-id>` - mark a conversation as the active view
//! - `close`          - leave the active view
//! - `list`           - print peer rows with unseen badges
//! - `quit`           - shut down the feed

use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley::bus::{EventBus, NatsBus};
use parley::config::NatsArgs;
use parley::feed::{FeedNotification, LiveFeed};
use parley::store::keys;
use parley::types::UserProfile;

#[derive(Parser, Debug)]
#[command(name = "parley-feed")]
#[command(about = "Terminal live feed for a Parley gateway")]
struct FeedArgs {
    /// Gateway base URL
    #[arg(long, env = "PARLEY_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Session token
    #[arg(long, env = "PARLEY_TOKEN")]
    token: String,

    /// NATS configuration
    #[command(flatten)]
    nats: NatsArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> anyhow::Result<T> {
    let response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

fn render_rows(rows: &[(UserProfile, usize)]) {
    if rows.is_empty() {
        println!("(no friends yet)");
        return;
    }
    for (profile, unseen) in rows {
        if *unseen > 0 {
            println!("  {} <{}> [{}] ({} unseen)", profile.name, profile.email, profile.id, unseen);
        } else {
            println!("  {} <{}> [{}]", profile.name, profile.email, profile.id);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = FeedArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("parley={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = reqwest::Client::new();
    let me: Me = fetch_json(&client, &format!("{}/api/me", args.server), &args.token).await?;
    let snapshot: Vec<UserProfile> =
        fetch_json(&client, &format!("{}/api/friends", args.server), &args.token).await?;

    info!(user = %me.id, friends = snapshot.len(), "Session resolved");

    let bus: Arc<dyn EventBus> =
        Arc::new(NatsBus::connect(&args.nats, &format!("parley-feed-{}", me.id)).await?);
    let (feed, mut notifications) = LiveFeed::start(bus, &me.id, snapshot).await?;

    println!("Connected as {}. Commands: open <peer-id> | close | list | quit", me.id);
    render_rows(&feed.rows().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Some(FeedNotification::Message(m)) => {
                    println!("* {}: {}", m.sender_name, m.text);
                }
                Some(FeedNotification::FriendRequest { sender_email, .. }) => {
                    println!("* friend request from {}", sender_email);
                }
                None => {
                    warn!("Notification stream closed");
                    break;
                }
            },
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("stdin error: {}", e);
                        break;
                    }
                };
                let mut parts = line.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("open"), Some(peer_id)) => {
                        feed.set_active_view(Some(keys::chat_id(&me.id, peer_id))).await;
                        println!("viewing {}", peer_id);
                    }
                    (Some("close"), _) => {
                        feed.set_active_view(None).await;
                        println!("view closed");
                    }
                    (Some("list"), _) => render_rows(&feed.rows().await),
                    (Some("quit"), _) | (Some("exit"), _) => break,
                    (Some(other), _) => println!("unknown command: {}", other),
                    (None, _) => {}
                }
            }
        }
    }

    feed.shutdown().await;
    Ok(())
}
