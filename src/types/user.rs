//! User profile as stored by the auth collaborator
//!
//! Parley never creates users in production; it reads the profile JSON
//! the auth service writes under `user:{id}` and the email index under
//! `user:email:{email}`.

use serde::{Deserialize, Serialize};

/// A user as seen by the relationship layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Opaque user id
    pub id: String,
    pub email: String,
    /// Display name
    pub name: String,
    /// Avatar reference (URL or storage key)
    #[serde(default)]
    pub image: Option<String>,
}

impl UserProfile {
    /// Serialize to the stored JSON form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the stored JSON form
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
