//! Event names and payloads carried on the bus

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserProfile;

/// Published on `user:{target}:incoming_friend_requests` when an
/// admission passes all checks
pub const EVENT_INCOMING_FRIEND_REQUEST: &str = "incoming_friend_request";

/// Published on both users' `user:{id}:friends` channels when an accept
/// completes
pub const EVENT_NEW_FRIEND: &str = "new_friend";

/// Published on the recipient's aggregated `user:{id}:chats` channel
pub const EVENT_NEW_MESSAGE: &str = "new_message";

/// Published on the per-conversation `chat:{id}` channel
pub const EVENT_INCOMING_MESSAGE: &str = "incoming_message";

/// Live hint that a friend request was admitted
///
/// Carries requester identity only; subscribers re-derive authoritative
/// state from the store, not from this payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestEvent {
    pub sender_id: String,
    pub sender_email: String,
}

/// A chat message as carried on the bus (not persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default)]
    pub sender_image: Option<String>,
    pub recipient_id: String,
    pub text: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl ChatMessage {
    /// Build a message from the sender's profile
    pub fn new(sender: &UserProfile, recipient_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            sender_image: sender.image.clone(),
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_form_is_camel_case() {
        let sender = UserProfile {
            id: "u1".into(),
            email: "u1@example.com".into(),
            name: "Uma".into(),
            image: None,
        };
        let message = ChatMessage::new(&sender, "u2", "hello");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["senderId"], "u1");
        assert_eq!(value["recipientId"], "u2");
        assert_eq!(value["senderName"], "Uma");
        assert!(value["timestamp"].is_i64());
    }
}
