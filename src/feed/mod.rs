//! Live relationship feed
//!
//! Client-side reconciliation of bus events into a rendered peer list:
//! a pure state machine (`FeedState`) with every input explicit, and an
//! async subscriber (`LiveFeed`) that drives it from channel
//! deliveries. The active conversation is injected by the caller, never
//! read from ambient navigation state.

pub mod live;
pub mod state;

pub use live::{FeedNotification, LiveFeed};
pub use state::FeedState;
