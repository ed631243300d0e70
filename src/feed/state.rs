//! Feed reconciliation state machine
//!
//! State: the ordered peer list (initialized from the server snapshot,
//! then grown only by `new_friend` events), a buffered log of unseen
//! messages, and the currently-viewed conversation. Unseen counts are
//! recomputed from the log, and entering a conversation clears exactly
//! that peer's buffered entries.
//!
//! Events may interleave across channels in any order: a message for a
//! peer not yet in the list still counts, and the row appears once the
//! `new_friend` event (or the snapshot) supplies the profile.

use crate::bus::events::ChatMessage;
use crate::store::keys;
use crate::types::UserProfile;

/// Transient, user-dismissible notification raised for a message whose
/// conversation is not the active view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNotification {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_image: Option<String>,
    pub text: String,
}

/// Per-session feed state
pub struct FeedState {
    session_id: String,
    active_chats: Vec<UserProfile>,
    unseen: Vec<ChatMessage>,
    active_view: Option<String>,
}

impl FeedState {
    /// Start from the server-provided friends snapshot
    pub fn new(session_id: &str, snapshot: Vec<UserProfile>) -> Self {
        let mut state = Self {
            session_id: session_id.to_string(),
            active_chats: Vec::new(),
            unseen: Vec::new(),
            active_view: None,
        };
        for peer in snapshot {
            state.handle_new_friend(peer);
        }
        state
    }

    /// Reconcile a delivered `new_message` event
    ///
    /// Returns the notification to raise, or `None` when the message's
    /// conversation is the active view (the message counts as seen and
    /// is neither buffered nor notified).
    pub fn handle_message(&mut self, message: ChatMessage) -> Option<MessageNotification> {
        let conversation = keys::chat_id(&self.session_id, &message.sender_id);
        if self.active_view.as_deref() == Some(conversation.as_str()) {
            return None;
        }

        let notification = MessageNotification {
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            sender_image: message.sender_image.clone(),
            text: message.text.clone(),
        };
        self.unseen.push(message);
        Some(notification)
    }

    /// Reconcile a delivered `new_friend` event; idempotent on peer id
    pub fn handle_new_friend(&mut self, peer: UserProfile) {
        if !self.active_chats.iter().any(|p| p.id == peer.id) {
            self.active_chats.push(peer);
        }
    }

    /// Change the currently-viewed conversation
    ///
    /// Called on every navigation change. Entering a conversation clears
    /// that peer's buffered unseen entries; other peers' counts are
    /// untouched.
    pub fn set_active_view(&mut self, conversation: Option<String>) {
        self.active_view = conversation;
        if let Some(active) = self.active_view.clone() {
            let session_id = self.session_id.clone();
            self.unseen
                .retain(|m| keys::chat_id(&session_id, &m.sender_id) != active);
        }
    }

    /// The currently-viewed conversation id, if any
    pub fn active_view(&self) -> Option<&str> {
        self.active_view.as_deref()
    }

    /// Messages received from `peer_id` since its conversation was last
    /// the active view
    pub fn unseen_count(&self, peer_id: &str) -> usize {
        self.unseen.iter().filter(|m| m.sender_id == peer_id).count()
    }

    /// Peer rows in render order with their unseen counts
    ///
    /// Deterministic total order: case-insensitive display name, peer id
    /// as tie-break.
    pub fn rows(&self) -> Vec<(&UserProfile, usize)> {
        let mut rows: Vec<_> = self
            .active_chats
            .iter()
            .map(|p| (p, self.unseen_count(&p.id)))
            .collect();
        rows.sort_by(|(a, _), (b, _)| {
            (a.name.to_lowercase(), &a.id).cmp(&(b.name.to_lowercase(), &b.id))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, name: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: name.to_string(),
            image: None,
        }
    }

    fn message(sender: &str, text: &str) -> ChatMessage {
        ChatMessage::new(&peer(sender, sender), "me", text)
    }

    #[test]
    fn test_inactive_conversation_notifies_and_counts() {
        let mut state = FeedState::new("me", vec![peer("u2", "Beth")]);

        let notification = state.handle_message(message("u2", "hi")).unwrap();
        assert_eq!(notification.sender_id, "u2");
        assert_eq!(notification.text, "hi");
        assert_eq!(state.unseen_count("u2"), 1);
    }

    #[test]
    fn test_active_conversation_suppresses_notification() {
        let mut state = FeedState::new("me", vec![peer("u2", "Beth")]);
        state.set_active_view(Some(keys::chat_id("me", "u2")));

        assert!(state.handle_message(message("u2", "hi")).is_none());
        assert_eq!(state.unseen_count("u2"), 0);
    }

    #[test]
    fn test_entering_conversation_clears_only_that_peer() {
        let mut state = FeedState::new("me", vec![peer("u2", "Beth"), peer("u3", "Carl")]);
        state.handle_message(message("u2", "one"));
        state.handle_message(message("u2", "two"));
        state.handle_message(message("u3", "three"));

        state.set_active_view(Some(keys::chat_id("me", "u2")));

        assert_eq!(state.unseen_count("u2"), 0);
        assert_eq!(state.unseen_count("u3"), 1);
    }

    #[test]
    fn test_view_change_reevaluated_on_every_navigation() {
        let mut state = FeedState::new("me", vec![peer("u2", "Beth"), peer("u3", "Carl")]);
        state.handle_message(message("u2", "one"));
        state.set_active_view(Some(keys::chat_id("me", "u2")));
        assert_eq!(state.unseen_count("u2"), 0);

        // Navigate away; new messages accrue again
        state.set_active_view(None);
        state.handle_message(message("u2", "two"));
        assert_eq!(state.unseen_count("u2"), 1);

        state.handle_message(message("u3", "x"));
        state.set_active_view(Some(keys::chat_id("me", "u3")));
        assert_eq!(state.unseen_count("u3"), 0);
        assert_eq!(state.unseen_count("u2"), 1);
    }

    #[test]
    fn test_duplicate_new_friend_is_noop() {
        let mut state = FeedState::new("me", vec![peer("u2", "Beth")]);
        state.handle_new_friend(peer("u2", "Beth"));
        state.handle_new_friend(peer("u2", "Beth"));

        assert_eq!(state.rows().len(), 1);
    }

    #[test]
    fn test_message_before_new_friend_still_counts() {
        let mut state = FeedState::new("me", vec![]);

        let notification = state.handle_message(message("u9", "early"));
        assert!(notification.is_some());
        assert_eq!(state.unseen_count("u9"), 1);
        assert!(state.rows().is_empty());

        // The row appears once the friend event supplies the profile,
        // count intact
        state.handle_new_friend(peer("u9", "Zoe"));
        let rows = state.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, 1);
    }

    #[test]
    fn test_rows_are_name_ordered_with_id_tiebreak() {
        let mut state = FeedState::new("me", vec![]);
        state.handle_new_friend(peer("u3", "carl"));
        state.handle_new_friend(peer("u1", "Ann"));
        state.handle_new_friend(peer("u2", "Beth"));
        state.handle_new_friend(peer("u4", "ann"));

        let ids: Vec<_> = state.rows().iter().map(|(p, _)| p.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u4", "u2", "u3"]);
    }

    #[test]
    fn test_snapshot_deduplicates() {
        let state = FeedState::new("me", vec![peer("u2", "Beth"), peer("u2", "Beth")]);
        assert_eq!(state.rows().len(), 1);
    }
}
