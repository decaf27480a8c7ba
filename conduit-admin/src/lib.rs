//! # conduit-admin — Admin control plane
//!
//! A raw `tokio::net::TcpListener` line-protocol server, intentionally not
//! built on `axum`/`tower` since this operator-facing CLI transport is kept
//! separate from the HTTP surface entirely. See [`server`] for
//! the accept loop, [`protocol`] for command parsing, [`backend`] for the
//! trait the gateway binary implements, and [`locks`] for the config-lock
//! Redis connection.

pub mod backend;
pub mod locks;
pub mod protocol;
pub mod server;

pub use backend::AdminBackend;
pub use locks::LockStore;
pub use protocol::Command;
pub use server::AdminServer;
