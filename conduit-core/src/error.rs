//! Error taxonomy and response-envelope formatting.
//!
//! Every component-level error type in the workspace (`conduit-data`'s
//! `DataError`, `conduit-rules`'s `RuleError`, `conduit-plugins`'s
//! `PluginError`, ...) converts into one of these variants via `map_error!`
//! or a manual `From` impl. `AppError::into_response` is the single place
//! that formats the `{success, message, error, data, module, code}` envelope
//! and tags it with `type` and the request id picked up from
//! [`crate::request_id::current_request_id`].

use crate::http::{IntoResponse, Json, Response, StatusCode};

/// The full error taxonomy mediated requests can fail with.
pub enum AppError {
    /// Bearer/basic/body authentication failed or was missing. 401.
    Auth(String),
    /// Principal's roles don't intersect the endpoint's ACL. 403.
    Forbidden(String),
    /// Request body/params failed validation. 400.
    Validation(String),
    /// No row/route matched. 404.
    NotFound(String),
    /// Rate-limit window exceeded. 429.
    RateLimit(String),
    /// Config failed to load or refused an edit (duplicate route, bad identifier, ...).
    Config(String),
    /// A database-adapter failure. `transient` failures (e.g. connection not
    /// yet warm) are retried once at the facade before surfacing here.
    Db { message: String, transient: bool },
    /// A rule failed to evaluate. Logged and non-fatal by default — only
    /// surfaces as a response error when a rule explicitly sets one.
    Rule(String),
    /// A plugin failed. Fatal to that plugin at load time; isolated to the
    /// single handler invocation at runtime.
    Plugin(String),
    /// Anything else.
    Internal(String),
    /// An escape hatch for a caller-constructed status/body, used by
    /// rule-engine short-circuits that set an explicit `response.status`.
    Custom { status: StatusCode, body: serde_json::Value },
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Db { transient, .. } => {
                if *transient {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            AppError::Rule(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Plugin(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Custom { status, .. } => *status,
        }
    }

    /// The stable `type` tag surfaced in the envelope (and logged).
    fn type_tag(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AuthError",
            AppError::Forbidden(_) => "ForbiddenError",
            AppError::Validation(_) => "ValidationError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::RateLimit(_) => "RateLimitError",
            AppError::Config(_) => "ConfigError",
            AppError::Db { .. } => "DbError",
            AppError::Rule(_) => "RuleError",
            AppError::Plugin(_) => "PluginError",
            AppError::Internal(_) => "InternalError",
            AppError::Custom { .. } => "CustomError",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Auth(m)
            | AppError::Forbidden(m)
            | AppError::Validation(m)
            | AppError::NotFound(m)
            | AppError::RateLimit(m)
            | AppError::Config(m)
            | AppError::Rule(m)
            | AppError::Plugin(m)
            | AppError::Internal(m) => m.clone(),
            AppError::Db { message, .. } => message.clone(),
            AppError::Custom { body, .. } => body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("error")
                .to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let type_tag = self.type_tag();
        let message = self.message();
        let request_id = crate::request_id::current_request_id();

        if std::env::var("CONDUIT_ENV").as_deref() == Ok("production") {
            tracing::warn!(error.type = type_tag, request_id = ?request_id, "request failed");
        } else {
            tracing::warn!(error.type = type_tag, request_id = ?request_id, %message, "request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "error": type_tag,
            "data": serde_json::Value::Null,
            "module": serde_json::Value::Null,
            "code": status.as_u16(),
            "requestId": request_id,
        });
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_tag(), self.message())
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Generate `From<E> for AppError` implementations that map error types to
/// a specific `AppError` variant (single-field variants only).
///
/// ```ignore
/// conduit_core::map_error! {
///     sqlx::Error => Internal,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::AppError {
                fn from(err: $err_ty) -> Self {
                    $crate::AppError::$variant(err.to_string())
                }
            }
        )*
    };
}
