//! Request-id tagging — the first stage of the middleware chain.
//!
//! Every inbound request is stamped with a UUID before anything else runs.
//! The id is attached to the request/response as an extension (so handlers
//! and `AppError`'s envelope formatting can read it) and, per the design
//! note to keep ambient state to a minimum, scoped into a task-local only
//! for logging — everything else receives it as an explicit value.

use tokio::task_local;
use uuid::Uuid;

use crate::http::{HeaderName, HeaderValue, Next, Request, Response};

task_local! {
    static CURRENT_REQUEST_ID: String;
}

/// The id assigned to one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read the request id of the request currently being processed on this task,
/// if the [`request_id_layer`] middleware has scoped one. Used by `AppError`
/// to tag error envelopes without threading an explicit parameter through
/// every `?`-propagated error site.
pub fn current_request_id() -> Option<String> {
    CURRENT_REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Run `fut` with `id` scoped as the current request id. Exposed for tests
/// in other modules/crates that need to assert on request-id propagation
/// without going through the full [`request_id_layer`] middleware.
pub async fn scope_request_id<F: std::future::Future>(id: impl Into<String>, fut: F) -> F::Output {
    CURRENT_REQUEST_ID.scope(id.into(), fut).await
}

/// `axum::middleware::from_fn` compatible tower middleware that tags each
/// request with a fresh [`RequestId`], inserts it as a request extension and
/// an `x-request-id` response header, and scopes it into the task-local for
/// the duration of the request.
pub async fn request_id_layer(mut req: Request, next: Next) -> Response {
    let id = RequestId::new();
    req.extensions_mut().insert(id.clone());

    let id_for_scope = id.0.clone();
    let mut response = CURRENT_REQUEST_ID
        .scope(id_for_scope, next.run(req))
        .await;

    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn current_request_id_absent_outside_scope() {
        assert_eq!(current_request_id(), None);
    }

    #[tokio::test]
    async fn current_request_id_visible_inside_scope() {
        let id = "test-id-1234".to_string();
        let observed = CURRENT_REQUEST_ID
            .scope(id.clone(), async { current_request_id() })
            .await;
        assert_eq!(observed, Some(id));
    }
}
