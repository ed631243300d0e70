//! Parley - realtime friends and chat gateway
//!
//! Parley mediates mutual "friend" relationships and live chat
//! notification between users of a shared Redis relationship store and a
//! NATS event bus.
//!
//! ## Services
//!
//! - **Admission**: the friend-request protocol (validate, then publish a
//!   live hint, then persist the pending request)
//! - **Relationship routes**: accept/deny pending requests, send chat
//!   messages, serve the friends snapshot
//! - **Live feed**: client-side reconciliation of bus events into an
//!   ordered peer list with per-peer unseen counts

pub mod auth;
pub mod bus;
pub mod config;
pub mod feed;
pub mod friends;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ParleyError, Result};
