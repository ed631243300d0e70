//! Friend-request admission
//!
//! The validate-then-mutate sequence governing whether a friend request
//! enters pending state. Checks run in a fixed order and the first
//! failure is terminal; no partial mutation happens before all checks
//! pass. The store's set-add is idempotent, so the unlocked
//! check-then-write sequence can at worst emit a duplicate notification
//! event for what becomes a single stored request.

use tracing::info;

use super::AdmissionError;
use crate::auth::Session;
use crate::bus::events::{FriendRequestEvent, EVENT_INCOMING_FRIEND_REQUEST};
use crate::bus::EventBus;
use crate::store::{keys, RelationStore};
use crate::types::ParleyError;

/// Syntactic email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if email.contains(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty())
}

/// Admit a friend request from the session user to `target_email`
///
/// On success the requester is a member of the target's
/// incoming-request set and one `incoming_friend_request` hint has been
/// published on the target's channel. The publish happens *before* the
/// persisting write: the event is a notification, the set membership is
/// the source of truth.
pub async fn submit_friend_request(
    store: &dyn RelationStore,
    bus: &dyn EventBus,
    session: Option<&Session>,
    target_email: &str,
) -> Result<(), AdmissionError> {
    if !is_valid_email(target_email) {
        return Err(AdmissionError::Validation("Invalid request payload"));
    }

    let target_id = store
        .get(&keys::user_by_email(target_email))
        .await?
        .ok_or(AdmissionError::NotFound("This person does not exist"))?;

    let session = session.ok_or(AdmissionError::Unauthorized("Unauthorized"))?;

    if target_id == session.user_id {
        return Err(AdmissionError::InvalidRequest(
            "You cannot add yourself as a friend",
        ));
    }

    let already_requested = store
        .set_contains(&keys::incoming_requests(&target_id), &session.user_id)
        .await?;
    if already_requested {
        return Err(AdmissionError::Conflict("Already added this user"));
    }

    let already_friends = store
        .set_contains(&keys::friends(&session.user_id), &target_id)
        .await?;
    if already_friends {
        return Err(AdmissionError::Conflict("Already friends with this user"));
    }

    let event = FriendRequestEvent {
        sender_id: session.user_id.clone(),
        sender_email: session.user_email.clone(),
    };
    bus.publish(
        &keys::incoming_requests(&target_id),
        EVENT_INCOMING_FRIEND_REQUEST,
        serde_json::to_value(&event).map_err(ParleyError::from)?,
    )
    .await?;

    store
        .set_add(&keys::incoming_requests(&target_id), &session.user_id)
        .await?;

    info!(
        requester = %session.user_id,
        target = %target_id,
        "Friend request admitted"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::store::MemoryStore;
    use crate::types::UserProfile;

    fn session(id: &str, email: &str) -> Session {
        Session {
            user_id: id.to_string(),
            user_email: email.to_string(),
        }
    }

    async fn seed_user(store: &MemoryStore, id: &str, email: &str, name: &str) {
        let profile = UserProfile {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            image: None,
        };
        store
            .set(&keys::user(id), &profile.to_json().unwrap())
            .await
            .unwrap();
        store.set(&keys::user_by_email(email), id).await.unwrap();
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@sub.example.com"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("nodomain"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a@b..com"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[tokio::test]
    async fn test_valid_request_persists_membership() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u2", "u2@example.com", "Beth").await;

        let s = session("u1", "u1@example.com");
        submit_friend_request(&store, &bus, Some(&s), "u2@example.com")
            .await
            .unwrap();

        assert!(store
            .set_contains(&keys::incoming_requests("u2"), "u1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_valid_request_publishes_hint_to_target_channel() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u2", "u2@example.com", "Beth").await;

        let mut sub = bus.subscribe(&keys::incoming_requests("u2")).await.unwrap();

        let s = session("u1", "u1@example.com");
        submit_friend_request(&store, &bus, Some(&s), "u2@example.com")
            .await
            .unwrap();

        let envelope = sub.next().await.unwrap();
        assert_eq!(envelope.event, EVENT_INCOMING_FRIEND_REQUEST);
        assert_eq!(envelope.data["senderId"], "u1");
        assert_eq!(envelope.data["senderEmail"], "u1@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_request_conflicts_with_single_membership() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u2", "u2@example.com", "Beth").await;

        let s = session("u1", "u1@example.com");
        submit_friend_request(&store, &bus, Some(&s), "u2@example.com")
            .await
            .unwrap();

        let err = submit_friend_request(&store, &bus, Some(&s), "u2@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Conflict(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::BAD_REQUEST);

        let members = store
            .set_members(&keys::incoming_requests("u2"))
            .await
            .unwrap();
        assert_eq!(members, vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_self_request_rejected_regardless_of_state() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u1", "u1@example.com", "Ann").await;

        let s = session("u1", "u1@example.com");
        let err = submit_friend_request(&store, &bus, Some(&s), "u1@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidRequest(_)));

        // Still rejected when a (bogus) pending state exists
        store
            .set_add(&keys::incoming_requests("u1"), "u1")
            .await
            .unwrap();
        let err = submit_friend_request(&store, &bus, Some(&s), "u1@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_email_mutates_nothing() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();

        let s = session("u1", "u1@example.com");
        let err = submit_friend_request(&store, &bus, Some(&s), "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));

        // No incoming set anywhere gained a member
        assert!(store
            .set_members(&keys::incoming_requests("ghost"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u2", "u2@example.com", "Beth").await;

        let err = submit_friend_request(&store, &bus, None, "u2@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Unauthorized(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_email_fails_validation_before_lookup() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();

        let s = session("u1", "u1@example.com");
        let err = submit_friend_request(&store, &bus, Some(&s), "not-an-email")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Validation(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_already_friends_conflicts_without_pending_request() {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        seed_user(&store, "u2", "u2@example.com", "Beth").await;

        store.set_add(&keys::friends("u1"), "u2").await.unwrap();

        let s = session("u1", "u1@example.com");
        let err = submit_friend_request(&store, &bus, Some(&s), "u2@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Conflict(_)));
        assert!(store
            .set_members(&keys::incoming_requests("u2"))
            .await
            .unwrap()
            .is_empty());
    }
}
