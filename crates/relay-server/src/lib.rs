//! # relay-server
//!
//! The real-time presence and messaging hub: an Axum HTTP + WebSocket
//! server that tracks which users are reachable, routes private and
//! broadcast messages, and coordinates typing indicators and read receipts.
//!
//! Architecture, leaves first:
//! - [`client`] — one live connection: outbound queue and tri-state lifecycle
//! - [`registry`] — lock-guarded membership view, written only by the hub loop
//! - [`validate`] — inbound envelope classification (forward / reply / reject)
//! - [`router`] — persistence bridge for private messages
//! - [`hub`] — the single serial event loop owning membership
//! - [`session`] — per-connection read and write loops
//! - [`server`] — upgrade endpoint, `/health`, `/metrics`

pub mod client;
pub mod config;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stats;
pub mod validate;
