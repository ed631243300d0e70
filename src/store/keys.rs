//! Logical key and channel naming
//!
//! Store keys and bus channels share one namespaced scheme derived from
//! entity ids. The per-conversation id is symmetric: both participants
//! derive the same id regardless of argument order.

/// Profile JSON for a user
pub fn user(id: &str) -> String {
    format!("user:{}", id)
}

/// Email -> user id index
pub fn user_by_email(email: &str) -> String {
    format!("user:email:{}", email)
}

/// Friend set of a user; doubles as the channel carrying `new_friend`
pub fn friends(id: &str) -> String {
    format!("user:{}:friends", id)
}

/// Pending incoming-request set; doubles as the channel carrying
/// `incoming_friend_request`
pub fn incoming_requests(id: &str) -> String {
    format!("user:{}:incoming_friend_requests", id)
}

/// Aggregated new-message channel for a user
pub fn chats(id: &str) -> String {
    format!("user:{}:chats", id)
}

/// Order-independent conversation id for two participants
pub fn chat_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}--{}", a, b)
    } else {
        format!("{}--{}", b, a)
    }
}

/// Per-conversation channel
pub fn chat_channel(a: &str, b: &str) -> String {
    format!("chat:{}", chat_id(a, b))
}
