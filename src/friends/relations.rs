//! Accept/deny, message send, and snapshot reads
//!
//! The accept step converts a pending request into the symmetric friend
//! relationship. The store has no multi-key transaction, so the
//! relationship is two independently-idempotent set-adds performed
//! unconditionally once the checks pass; a retried accept converges
//! because every write is a set add or remove.

use tracing::{info, warn};

use super::AdmissionError;
use crate::auth::Session;
use crate::bus::events::{ChatMessage, EVENT_INCOMING_MESSAGE, EVENT_NEW_FRIEND, EVENT_NEW_MESSAGE};
use crate::bus::EventBus;
use crate::store::{keys, RelationStore};
use crate::types::{ParleyError, UserProfile};

async fn load_profile(
    store: &dyn RelationStore,
    user_id: &str,
) -> Result<Option<UserProfile>, ParleyError> {
    match store.get(&keys::user(user_id)).await? {
        Some(json) => match UserProfile::from_json(&json) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(user = %user_id, error = %e, "Corrupt profile record");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Accept a pending friend request from `requester_id`
///
/// Publishes `new_friend` on both users' friends channels first, then
/// performs the four idempotent writes: both friend-set adds and both
/// incoming-set removes (the reverse remove also clears any reciprocal
/// pending request).
pub async fn accept_friend_request(
    store: &dyn RelationStore,
    bus: &dyn EventBus,
    session: &Session,
    requester_id: &str,
) -> Result<(), AdmissionError> {
    let pending = store
        .set_contains(&keys::incoming_requests(&session.user_id), requester_id)
        .await?;
    if !pending {
        return Err(AdmissionError::NotFound("No friend request"));
    }

    let already_friends = store
        .set_contains(&keys::friends(&session.user_id), requester_id)
        .await?;
    if already_friends {
        return Err(AdmissionError::Conflict("Already friends with this user"));
    }

    let me = load_profile(store, &session.user_id)
        .await?
        .ok_or(AdmissionError::NotFound("This person does not exist"))?;
    let them = load_profile(store, requester_id)
        .await?
        .ok_or(AdmissionError::NotFound("This person does not exist"))?;

    bus.publish(
        &keys::friends(requester_id),
        EVENT_NEW_FRIEND,
        serde_json::to_value(&me).map_err(ParleyError::from)?,
    )
    .await?;
    bus.publish(
        &keys::friends(&session.user_id),
        EVENT_NEW_FRIEND,
        serde_json::to_value(&them).map_err(ParleyError::from)?,
    )
    .await?;

    store
        .set_add(&keys::friends(&session.user_id), requester_id)
        .await?;
    store
        .set_add(&keys::friends(requester_id), &session.user_id)
        .await?;
    store
        .set_remove(&keys::incoming_requests(&session.user_id), requester_id)
        .await?;
    store
        .set_remove(&keys::incoming_requests(requester_id), &session.user_id)
        .await?;

    info!(user = %session.user_id, friend = %requester_id, "Friend request accepted");

    Ok(())
}

/// Deny a pending friend request; idempotent
pub async fn deny_friend_request(
    store: &dyn RelationStore,
    session: &Session,
    requester_id: &str,
) -> Result<(), AdmissionError> {
    store
        .set_remove(&keys::incoming_requests(&session.user_id), requester_id)
        .await?;
    info!(user = %session.user_id, requester = %requester_id, "Friend request denied");
    Ok(())
}

/// Send a chat message to a friend
///
/// Not persisted; published on the per-conversation channel and on the
/// recipient's aggregated chats channel.
pub async fn send_message(
    store: &dyn RelationStore,
    bus: &dyn EventBus,
    session: &Session,
    recipient_id: &str,
    text: &str,
) -> Result<ChatMessage, AdmissionError> {
    if text.trim().is_empty() {
        return Err(AdmissionError::Validation("Message text must not be empty"));
    }

    let is_friend = store
        .set_contains(&keys::friends(&session.user_id), recipient_id)
        .await?;
    if !is_friend {
        return Err(AdmissionError::Unauthorized("Not friends with this user"));
    }

    let sender = load_profile(store, &session.user_id)
        .await?
        .ok_or(AdmissionError::NotFound("This person does not exist"))?;

    let message = ChatMessage::new(&sender, recipient_id, text);
    let payload = serde_json::to_value(&message).map_err(ParleyError::from)?;

    bus.publish(
        &keys::chat_channel(&session.user_id, recipient_id),
        EVENT_INCOMING_MESSAGE,
        payload.clone(),
    )
    .await?;
    bus.publish(&keys::chats(recipient_id), EVENT_NEW_MESSAGE, payload)
        .await?;

    Ok(message)
}

/// The server-provided snapshot the live feed initializes from
///
/// Members with a missing or corrupt profile record are skipped rather
/// than failing the whole snapshot.
pub async fn friends_snapshot(
    store: &dyn RelationStore,
    user_id: &str,
) -> Result<Vec<UserProfile>, ParleyError> {
    let ids = store.set_members(&keys::friends(user_id)).await?;
    let mut profiles = Vec::with_capacity(ids.len());
    for id in &ids {
        match load_profile(store, id).await? {
            Some(profile) => profiles.push(profile),
            None => warn!(user = %user_id, friend = %id, "Skipping friend without profile"),
        }
    }
    Ok(profiles)
}

/// Profiles of users with a pending request to `user_id`
pub async fn incoming_requests_snapshot(
    store: &dyn RelationStore,
    user_id: &str,
) -> Result<Vec<UserProfile>, ParleyError> {
    let ids = store.set_members(&keys::incoming_requests(user_id)).await?;
    let mut profiles = Vec::with_capacity(ids.len());
    for id in &ids {
        match load_profile(store, id).await? {
            Some(profile) => profiles.push(profile),
            None => warn!(user = %user_id, requester = %id, "Skipping requester without profile"),
        }
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::store::MemoryStore;

    fn session(id: &str, email: &str) -> Session {
        Session {
            user_id: id.to_string(),
            user_email: email.to_string(),
        }
    }

    async fn seed_user(store: &MemoryStore, id: &str, name: &str) {
        let profile = UserProfile {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: name.to_string(),
            image: None,
        };
        store
            .set(&keys::user(id), &profile.to_json().unwrap())
            .await
            .unwrap();
        store
            .set(&keys::user_by_email(&profile.email), id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_accept_establishes_symmetric_friendship() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        seed_user(&store, "u2", "Beth").await;
        store
            .set_add(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap();

        let s = session("u1", "u1@example.com");
        accept_friend_request(&store, &bus, &s, "u2").await.unwrap();

        assert!(store.set_contains(&keys::friends("u1"), "u2").await.unwrap());
        assert!(store.set_contains(&keys::friends("u2"), "u1").await.unwrap());
        assert!(!store
            .set_contains(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_accept_notifies_both_parties() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        seed_user(&store, "u2", "Beth").await;
        store
            .set_add(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap();

        let mut mine = bus.subscribe(&keys::friends("u1")).await.unwrap();
        let mut theirs = bus.subscribe(&keys::friends("u2")).await.unwrap();

        let s = session("u1", "u1@example.com");
        accept_friend_request(&store, &bus, &s, "u2").await.unwrap();

        let envelope = mine.next().await.unwrap();
        assert_eq!(envelope.event, EVENT_NEW_FRIEND);
        assert_eq!(envelope.data["id"], "u2");

        let envelope = theirs.next().await.unwrap();
        assert_eq!(envelope.event, EVENT_NEW_FRIEND);
        assert_eq!(envelope.data["id"], "u1");
    }

    #[tokio::test]
    async fn test_accept_without_pending_request_is_rejected() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        seed_user(&store, "u2", "Beth").await;

        let s = session("u1", "u1@example.com");
        let err = accept_friend_request(&store, &bus, &s, "u2")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
        assert!(!store.set_contains(&keys::friends("u1"), "u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_reciprocal_pending_request_is_cleared_on_accept() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        seed_user(&store, "u2", "Beth").await;
        store
            .set_add(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap();
        store
            .set_add(&keys::incoming_requests("u2"), "u1")
            .await
            .unwrap();

        let s = session("u1", "u1@example.com");
        accept_friend_request(&store, &bus, &s, "u2").await.unwrap();

        assert!(!store
            .set_contains(&keys::incoming_requests("u2"), "u1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_deny_is_idempotent() {
        let store = MemoryStore::new();
        let s = session("u1", "u1@example.com");

        store
            .set_add(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap();
        deny_friend_request(&store, &s, "u2").await.unwrap();
        deny_friend_request(&store, &s, "u2").await.unwrap();

        assert!(!store
            .set_contains(&keys::incoming_requests("u1"), "u2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_send_message_requires_friendship() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;

        let s = session("u1", "u1@example.com");
        let err = send_message(&store, &bus, &s, "u2", "hi").await.unwrap_err();
        assert!(matches!(err, AdmissionError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_send_message_reaches_recipient_channels() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        store.set_add(&keys::friends("u1"), "u2").await.unwrap();

        let mut chats = bus.subscribe(&keys::chats("u2")).await.unwrap();
        let mut chat = bus.subscribe(&keys::chat_channel("u1", "u2")).await.unwrap();

        let s = session("u1", "u1@example.com");
        let message = send_message(&store, &bus, &s, "u2", "hello").await.unwrap();

        let envelope = chats.next().await.unwrap();
        assert_eq!(envelope.event, EVENT_NEW_MESSAGE);
        assert_eq!(envelope.data["senderId"], "u1");
        assert_eq!(envelope.data["text"], "hello");
        assert_eq!(envelope.data["id"], message.id.as_str());

        let envelope = chat.next().await.unwrap();
        assert_eq!(envelope.event, EVENT_INCOMING_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "Ann").await;
        store.set_add(&keys::friends("u1"), "u2").await.unwrap();

        let s = session("u1", "u1@example.com");
        let err = send_message(&store, &bus, &s, "u2", "   ").await.unwrap_err();
        assert!(matches!(err, AdmissionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_snapshot_skips_members_without_profiles() {
        let store = MemoryStore::new();
        seed_user(&store, "u2", "Beth").await;
        store.set_add(&keys::friends("u1"), "u2").await.unwrap();
        store.set_add(&keys::friends("u1"), "ghost").await.unwrap();

        let snapshot = friends_snapshot(&store, "u1").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "u2");
    }
}
