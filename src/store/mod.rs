//! Relationship store - set-membership primitives over logical keys
//!
//! Friend lists and pending incoming-request sets live in an external
//! key-value store as per-key string sets. Parley only consumes the
//! primitives; the storage engine itself is not its concern. All
//! mutations are single-key set operations, which are commutative and
//! idempotent, so no cross-key transactions are needed.

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::types::Result;

/// Store primitives consumed by the relationship layer
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Get a plain string value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a plain string value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Add a member to a set (idempotent)
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set (idempotent)
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// Test set membership
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// List all members of a set
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;
}
