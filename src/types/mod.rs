//! Shared types for Parley

pub mod error;
pub mod user;

pub use error::{ParleyError, Result};
pub use user::UserProfile;
