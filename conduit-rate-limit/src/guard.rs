//! [`Guard`]/[`PreAuthGuard`] adapters wiring [`RateLimitRegistry`](crate::RateLimitRegistry)
//! into the request pipeline.
//!
//! The gateway's rate-limit stage (per `perMinute`/`perHour` on the endpoint
//! descriptor) runs on a fixed 60 s window keyed by `(route, client-ip)` by
//! default; [`RateLimitKeyKind`] lets the key be widened to an authenticated
//! identity or narrowed to a global bucket shared by every client.

use conduit_core::guards::{Guard, GuardContext, Identity, PreAuthGuard, PreAuthGuardContext};
use conduit_core::http::{IntoResponse, Response};

use crate::RateLimitRegistry;

/// What a rate-limit bucket key is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitKeyKind {
    /// One shared bucket across all clients for this route.
    Global,
    /// One bucket per client IP (from the `X-Forwarded-For` header, falling
    /// back to a `"unknown"` placeholder when absent).
    Ip,
    /// One bucket per authenticated identity's subject.
    Identity,
}

/// A rate-limit rule: `max` requests per `window_secs`.
#[derive(Clone, Copy, Debug)]
pub struct RateLimit {
    pub max: u64,
    pub window_secs: u64,
}

impl RateLimit {
    pub const fn new(max: u64, window_secs: u64) -> Self {
        Self { max, window_secs }
    }

    /// Per-minute rate limit (the descriptor's `perMinute` field), on the
    /// spec's fixed 60 s window.
    pub const fn per_minute(max: u64) -> Self {
        Self::new(max, 60)
    }

    /// Per-hour rate limit (the descriptor's `perHour` field).
    pub const fn per_hour(max: u64) -> Self {
        Self::new(max, 3600)
    }
}

fn client_ip(headers: &conduit_core::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_response() -> Response {
    conduit_core::AppError::RateLimit("rate limit exceeded".to_string()).into_response()
}

/// Guard applied after identity resolution. Keys on route + (ip|identity|global).
pub struct RateLimitGuard {
    pub route: &'static str,
    pub limit: RateLimit,
    pub key_kind: RateLimitKeyKind,
}

impl<S, I> Guard<S, I> for RateLimitGuard
where
    S: Send + Sync,
    I: Identity,
    RateLimitRegistry: conduit_core::http::FromRef<S>,
{
    fn check(
        &self,
        state: &S,
        ctx: &GuardContext<'_, I>,
    ) -> impl std::future::Future<Output = Result<(), Response>> + Send {
        let registry = RateLimitRegistry::from_ref(state);
        let key = match self.key_kind {
            RateLimitKeyKind::Global => format!("{}:global", self.route),
            RateLimitKeyKind::Ip => format!("{}:{}", self.route, client_ip(ctx.headers)),
            RateLimitKeyKind::Identity => format!(
                "{}:{}",
                self.route,
                ctx.identity_sub().unwrap_or("anonymous")
            ),
        };
        let allowed = registry.try_acquire(&key, self.limit.max, self.limit.window_secs);
        std::future::ready(if allowed { Ok(()) } else { Err(rate_limit_response()) })
    }
}

/// Guard applied before identity resolution — only `Global`/`Ip` keys make sense here.
pub struct PreAuthRateLimitGuard {
    pub route: &'static str,
    pub limit: RateLimit,
    pub key_kind: RateLimitKeyKind,
}

impl<S> PreAuthGuard<S> for PreAuthRateLimitGuard
where
    S: Send + Sync,
    RateLimitRegistry: conduit_core::http::FromRef<S>,
{
    fn check(
        &self,
        state: &S,
        ctx: &PreAuthGuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<(), Response>> + Send {
        let registry = RateLimitRegistry::from_ref(state);
        let key = match self.key_kind {
            RateLimitKeyKind::Ip => format!("{}:{}", self.route, client_ip(ctx.headers)),
            _ => format!("{}:global", self.route),
        };
        let allowed = registry.try_acquire(&key, self.limit.max, self.limit.window_secs);
        std::future::ready(if allowed { Ok(()) } else { Err(rate_limit_response()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_minute_is_sixty_second_window() {
        let limit = RateLimit::per_minute(10);
        assert_eq!(limit.max, 10);
        assert_eq!(limit.window_secs, 60);
    }

    #[test]
    fn per_hour_is_thirty_six_hundred_second_window() {
        let limit = RateLimit::per_hour(100);
        assert_eq!(limit.window_secs, 3600);
    }
}
