//! # relay-store
//!
//! `SQLite` persistence collaborator for the relay hub.
//!
//! Layout follows a pool / migrations / repositories / facade split:
//! - [`pool`] — `r2d2` connection pool with WAL and foreign-key pragmas
//! - [`migrations`] — embedded, versioned, idempotent schema migrations
//! - [`repos`] — stateless repositories, every method takes `&Connection`
//! - [`ChatStore`] — the narrow interface the hub actually calls

pub mod chat_store;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use chat_store::ChatStore;
pub use error::{Result, StoreError};
pub use migrations::run_migrations;
pub use pool::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
