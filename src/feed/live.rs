//! Subscriber layer driving the feed state machine
//!
//! Subscribes to the session user's channels on start and unsubscribes
//! on every exit path, including shutdown and bus closure, so a
//! restarted feed never double-fires handlers. Events are handled in
//! delivery order per channel; no ordering is assumed across channels.
//! A malformed payload is logged and dropped, never allowed to tear
//! down the feed.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{FeedState, MessageNotification};
use crate::bus::events::{
    ChatMessage, FriendRequestEvent, EVENT_INCOMING_FRIEND_REQUEST, EVENT_NEW_FRIEND,
    EVENT_NEW_MESSAGE,
};
use crate::bus::{Envelope, EventBus, Subscription};
use crate::store::keys;
use crate::types::{Result, UserProfile};

const NOTIFICATION_BUFFER: usize = 32;

/// Notifications surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNotification {
    /// Unseen message in a conversation that is not the active view
    Message(MessageNotification),
    /// A new incoming friend request was admitted
    FriendRequest {
        sender_id: String,
        sender_email: String,
    },
}

/// A running live feed for one session user
pub struct LiveFeed {
    state: Arc<Mutex<FeedState>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Subscribe and start reconciling
    ///
    /// Returns the feed handle and the notification stream. Dropping
    /// the returned receiver only silences notifications; counts keep
    /// accruing.
    pub async fn start(
        bus: Arc<dyn EventBus>,
        session_id: &str,
        snapshot: Vec<UserProfile>,
    ) -> Result<(Self, mpsc::Receiver<FeedNotification>)> {
        let chats = bus.subscribe(&keys::chats(session_id)).await?;
        let friends = bus.subscribe(&keys::friends(session_id)).await?;
        let requests = bus.subscribe(&keys::incoming_requests(session_id)).await?;

        let state = Arc::new(Mutex::new(FeedState::new(session_id, snapshot)));
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(
            Arc::clone(&state),
            chats,
            friends,
            requests,
            notify_tx,
            shutdown_rx,
        ));

        info!(session = %session_id, "Live feed started");

        Ok((
            Self {
                state,
                shutdown: shutdown_tx,
                task,
            },
            notify_rx,
        ))
    }

    /// Inject the currently-viewed conversation (on every navigation
    /// change)
    pub async fn set_active_view(&self, conversation: Option<String>) {
        self.state.lock().await.set_active_view(conversation);
    }

    /// Peer rows in render order with unseen counts
    pub async fn rows(&self) -> Vec<(UserProfile, usize)> {
        let state = self.state.lock().await;
        state
            .rows()
            .into_iter()
            .map(|(p, n)| (p.clone(), n))
            .collect()
    }

    /// Unseen count for one peer
    pub async fn unseen_count(&self, peer_id: &str) -> usize {
        self.state.lock().await.unseen_count(peer_id)
    }

    /// Stop the feed and release its subscriptions
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn run_loop(
    state: Arc<Mutex<FeedState>>,
    mut chats: Subscription,
    mut friends: Subscription,
    mut requests: Subscription,
    notify_tx: mpsc::Sender<FeedNotification>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            // Err means the handle was dropped; treat as shutdown
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            envelope = chats.next() => match envelope {
                Some(envelope) => handle_envelope(&state, &notify_tx, envelope).await,
                None => break,
            },
            envelope = friends.next() => match envelope {
                Some(envelope) => handle_envelope(&state, &notify_tx, envelope).await,
                None => break,
            },
            envelope = requests.next() => match envelope {
                Some(envelope) => handle_envelope(&state, &notify_tx, envelope).await,
                None => break,
            },
        }
    }

    // Release on every exit path so re-activation cannot double-fire
    for subscription in [chats, friends, requests] {
        let channel = subscription.channel().to_string();
        if let Err(e) = subscription.unsubscribe().await {
            warn!(channel = %channel, error = %e, "Unsubscribe failed on feed shutdown");
        }
    }
    info!("Live feed stopped");
}

async fn handle_envelope(
    state: &Arc<Mutex<FeedState>>,
    notify_tx: &mpsc::Sender<FeedNotification>,
    envelope: Envelope,
) {
    match envelope.event.as_str() {
        EVENT_NEW_MESSAGE => match serde_json::from_value::<ChatMessage>(envelope.data) {
            Ok(message) => {
                let notification = state.lock().await.handle_message(message);
                if let Some(notification) = notification {
                    let _ = notify_tx.send(FeedNotification::Message(notification)).await;
                }
            }
            Err(e) => warn!(error = %e, "Dropping malformed new_message payload"),
        },
        EVENT_NEW_FRIEND => match serde_json::from_value::<UserProfile>(envelope.data) {
            Ok(peer) => state.lock().await.handle_new_friend(peer),
            Err(e) => warn!(error = %e, "Dropping malformed new_friend payload"),
        },
        EVENT_INCOMING_FRIEND_REQUEST => {
            match serde_json::from_value::<FriendRequestEvent>(envelope.data) {
                Ok(event) => {
                    let _ = notify_tx
                        .send(FeedNotification::FriendRequest {
                            sender_id: event.sender_id,
                            sender_email: event.sender_email,
                        })
                        .await;
                }
                Err(e) => warn!(error = %e, "Dropping malformed friend request payload"),
            }
        }
        other => debug!(event = %other, "Ignoring unknown event"),
    }
}
