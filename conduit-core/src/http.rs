//! Thin HTTP facade — the sole place in `conduit-core` that names `axum`
//! directly. Downstream crates import types through here so the underlying
//! HTTP stack can be swapped without touching call sites.

pub use axum::extract::{
    ConnectInfo, DefaultBodyLimit, Form, FromRef, FromRequest, FromRequestParts, Multipart,
    OptionalFromRequestParts, OriginalUri, Path, Query, RawPathParams, Request, State,
};
pub use axum::http::{
    request::Parts,
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
    header::{
        ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
        LOCATION, ORIGIN, REFERER, SET_COOKIE, USER_AGENT,
    },
};
pub use axum::middleware::{self, Next};
pub use axum::response::{IntoResponse, Response};
pub use axum::routing::{delete, get, patch, post, put};
pub use axum::{serve, Extension, Json, Router};
pub use bytes::Bytes;
