//! Application assembly: layer composition and the serve/shutdown lifecycle.
//!
//! The original builder tracked a compile-time bean graph via phantom
//! type-level lists, because routes were registered from `#[derive(Controller)]`
//! structs known at compile time. Here routes are synthesized at runtime from
//! JSON endpoint descriptors (the route table lives in the `conduit` binary
//! crate as an `ArcSwap`-guarded dispatch table), so the bean graph collapses
//! to a plain ordered list of Tower layers applied around whatever `Router<S>`
//! the caller hands in. What's kept from the original shape: the
//! `.layer()`-chaining builder API, and the graceful-shutdown/signal handling.

use std::future::Future;

use tracing::info;

use crate::http::Router;

/// Builder for assembling the outer layer stack around a state-typed router.
///
/// ```ignore
/// let app = AppBuilder::new(router)
///     .layer(request_id_layer)
///     .layer(secure_headers)
///     .into_router();
/// ```
pub struct AppBuilder<S> {
    router: Router<S>,
}

impl<S: Clone + Send + Sync + 'static> AppBuilder<S> {
    pub fn new(router: Router<S>) -> Self {
        Self { router }
    }

    /// Apply an arbitrary router transformation (adding a layer, a fallback,
    /// a nested sub-router, ...).
    pub fn with<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Router<S>) -> Router<S>,
    {
        self.router = f(self.router);
        self
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }
}

/// Handle returned by [`serve`] callers to trigger graceful shutdown from
/// outside the accept loop (used by the admin plane's `shutdown` command).
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: tokio::sync::watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> (Self, tokio::sync::watch::Receiver<bool>) {
        let (tx, rx) = tokio::sync::watch::channel(false);
        (Self { tx }, rx)
    }

    /// Signal the server to begin its graceful shutdown sequence.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Serve `router` on `addr` until a shutdown signal or the given handle is
/// triggered. Runs `on_shutdown` (draining the event-logger queue, closing
/// DB/Redis handles, ...) once the accept loop has stopped and in-flight
/// requests have completed.
pub async fn serve<S, F, Fut>(
    router: Router<S>,
    addr: &str,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    on_shutdown: F,
) -> std::io::Result<()>
where
    S: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "conduit gateway listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = shutdown_rx.changed() => {}
        }
    })
    .await?;

    on_shutdown().await;
    info!("conduit gateway stopped");
    Ok(())
}

/// Signals a running process can receive, per the admin/operations surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalSignal {
    /// `SIGHUP` — reload configuration.
    Reload,
    /// `SIGUSR2` — legacy interactive plugin control. Handled as a no-op
    /// that logs a deprecation notice; operators should use the admin TCP
    /// plane instead.
    LegacyPluginControl,
}

/// Spawn a background task that listens for `SIGHUP`/`SIGUSR2` for the
/// lifetime of the process, invoking `on_signal` for each occurrence.
/// No-op (returns immediately) on non-Unix targets.
#[cfg(unix)]
pub fn spawn_operational_signal_listener<F>(on_signal: F) -> tokio::task::JoinHandle<()>
where
    F: Fn(OperationalSignal) + Send + 'static,
{
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };
        let mut usr2 = match signal(SignalKind::user_defined2()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGUSR2 handler");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = hup.recv() => on_signal(OperationalSignal::Reload),
                _ = usr2.recv() => on_signal(OperationalSignal::LegacyPluginControl),
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_operational_signal_listener<F>(_on_signal: F) -> tokio::task::JoinHandle<()>
where
    F: Fn(OperationalSignal) + Send + 'static,
{
    tokio::spawn(async {})
}

/// Wait for a termination signal (Ctrl-C or SIGTERM on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::get;

    #[tokio::test]
    async fn app_builder_applies_layer() {
        let router: Router<()> = Router::new().route("/", get(|| async { "ok" }));
        let built = AppBuilder::new(router)
            .with(|r| r.route("/health", get(|| async { "healthy" })))
            .into_router();

        use tower::ServiceExt;
        let response = built
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[test]
    fn shutdown_handle_triggers_receiver() {
        let (handle, mut rx) = ShutdownHandle::new();
        assert!(!*rx.borrow());
        handle.trigger();
        assert!(rx.has_changed().unwrap());
    }
}
