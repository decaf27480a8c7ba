//! Thin HTTP facade — re-exports the `axum`/`http`/`bytes` surface so that
//! optional sub-crates (the proxy route kind, the file-upload route kind)
//! can depend on a stable path instead of pinning their own `axum` version.
//!
//! `conduit-core` depends on `axum` directly for its richer builder/guard
//! machinery; this crate exists for the thinner consumers that only need
//! request/response plumbing, grounded in the teacher's `r2e-http` split.

pub use axum::body::Body;
pub use axum::extract::{Path, Query, RawPathParams, Request, State};
pub use axum::http::{
    header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
};
pub use axum::response::{IntoResponse, Response};
pub use axum::routing::{delete, get, patch, post, put, MethodRouter};
pub use axum::Router;
pub use bytes::Bytes;

#[cfg(feature = "ws")]
pub use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};

#[cfg(feature = "multipart")]
pub use axum::extract::Multipart;

#[cfg(feature = "proxy")]
pub use hyper;
