//! Process entry point: bootstrap the shared context, synthesize the
//! route table, and run the HTTP gateway and the TCP admin plane
//! concurrently until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn;
use conduit_admin::locks::LockStore;
use conduit_admin::server::AdminServer;
use conduit_admin::AdminBackend;
use conduit_core::builder::{serve, spawn_operational_signal_listener, OperationalSignal};
use conduit_core::request_id::request_id_layer;
use conduit_scheduler::{start_scheduled_tasks, ScheduleConfig, ScheduledJobRegistry, ScheduledTaskDef};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config_store;
mod context;
mod db;
mod descriptor;
mod middleware;
mod routes;

use context::{GatewayContext, GatewayContextConfig};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read every descriptor's `businessRules` file (if any) and concatenate
/// their contents into the one combined DSL source `RuleEngine::reload`
/// expects: one ruleset compiled from every loaded endpoint.
async fn combined_rules_source(ctx: &GatewayContext) -> String {
    let config = ctx.config.current();
    let mut combined = String::new();
    for descriptor in &config.descriptors {
        let Some(path) = &descriptor.business_rules else { continue };
        match tokio::fs::read_to_string(path).await {
            Ok(src) => {
                combined.push_str(&src);
                combined.push('\n');
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "failed to read business rules file, skipping");
            }
        }
    }
    combined
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,conduit=debug".parse().unwrap()),
        )
        .json()
        .init();

    let event_flush_interval = Duration::from_secs(env_or("CONDUIT_EVENT_FLUSH_SECS", "5").parse().unwrap_or(5));
    let cfg = GatewayContextConfig {
        descriptor_path: env_or("CONDUIT_CONFIG_PATH", "./conduit.config.json"),
        plugin_directory: env_or("CONDUIT_PLUGIN_DIR", "./plugins"),
        redis_url: env_or("CONDUIT_REDIS_URL", "redis://127.0.0.1/"),
        event_queue_key: env_or("CONDUIT_EVENT_QUEUE_KEY", "conduit:events"),
        event_batch_size: env_or("CONDUIT_EVENT_BATCH_SIZE", "50").parse().unwrap_or(50),
        event_flush_interval,
        jwt_secret: env_or("CONDUIT_JWT_SECRET", "change-me-in-production"),
        jwt_issuer: env_or("CONDUIT_JWT_ISSUER", "conduit"),
        jwt_audience: env_or("CONDUIT_JWT_AUDIENCE", "conduit-clients"),
        internal_base_url: env_or("CONDUIT_INTERNAL_BASE_URL", "http://127.0.0.1:8080"),
    };
    let http_addr = env_or("CONDUIT_HTTP_ADDR", "0.0.0.0:8080");
    let admin_addr = env_or("CONDUIT_ADMIN_ADDR", "0.0.0.0:8081");

    let ctx = GatewayContext::bootstrap(cfg).await.expect("failed to bootstrap gateway context");

    let rules_source = combined_rules_source(&ctx).await;
    if !rules_source.trim().is_empty() {
        if let Err(err) = ctx.rules.reload(&rules_source) {
            tracing::error!(error = %err, "failed to compile business rules at startup");
        }
    }

    // The periodic event-logger flush is a scheduled task, not a hand-rolled
    // interval loop: `EventLoggerQueue` only supplies the one-shot flush
    // primitive, `conduit-scheduler` drives its recurrence.
    let flush_token = CancellationToken::new();
    let scheduled_jobs = ScheduledJobRegistry::new();
    let flush_task: Box<dyn std::any::Any + Send> = Box::new(Box::new(ScheduledTaskDef {
        name: "event-logger-flush".to_string(),
        schedule: ScheduleConfig::Interval(event_flush_interval),
        state: (ctx.events.clone(), ctx.clone() as Arc<dyn conduit_events::queue::EventSink>),
        task: Box::new(|(events, sink): (Arc<conduit_events::queue::EventLoggerQueue>, Arc<dyn conduit_events::queue::EventSink>)| {
            Box::pin(async move {
                if let Err(err) = events.shutdown(sink).await {
                    tracing::warn!(error = %err, "periodic event-logger flush failed");
                }
            })
        }),
    }) as Box<dyn conduit_scheduler::ScheduledTask>);
    start_scheduled_tasks(vec![flush_task], flush_token.clone(), &scheduled_jobs);

    let reload_ctx = ctx.clone();
    let _signals = spawn_operational_signal_listener(move |signal| match signal {
        OperationalSignal::Reload => {
            let ctx = reload_ctx.clone();
            tokio::spawn(async move {
                match ctx.config.reload().await {
                    Ok(()) => {
                        let combined = combined_rules_source(&ctx).await;
                        if let Err(err) = ctx.rules.reload(&combined) {
                            tracing::error!(error = %err, "business rules failed to recompile on SIGHUP reload");
                        }
                        tracing::info!("configuration reloaded via SIGHUP");
                    }
                    Err(err) => tracing::error!(error = %err, "SIGHUP config reload failed"),
                }
            });
        }
        OperationalSignal::LegacyPluginControl => {
            tracing::warn!("SIGUSR2 is deprecated, use the admin TCP plane instead");
        }
    });

    let router = routes::build_router(ctx.clone())
        .layer(from_fn(request_id_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let locks = LockStore::from_url(&env_or("CONDUIT_REDIS_URL", "redis://127.0.0.1/")).expect("failed to connect admin lock store");
    let admin_server = AdminServer::new(ctx.clone() as Arc<dyn AdminBackend>, locks);

    let http_shutdown_rx = ctx.shutdown_rx.clone();
    let admin_shutdown_rx = ctx.shutdown_rx.clone();
    let shutdown_ctx = ctx.clone();

    let http_task = tokio::spawn(async move {
        serve(router, &http_addr, http_shutdown_rx, || async move {
            flush_token.cancel();
            if let Err(err) = shutdown_ctx.events.shutdown(shutdown_ctx.clone() as Arc<dyn conduit_events::queue::EventSink>).await {
                tracing::warn!(error = %err, "final event-logger flush failed during shutdown");
            }
        })
        .await
    });
    let admin_task = tokio::spawn(async move { admin_server.serve(&admin_addr, admin_shutdown_rx).await });

    let (http_result, admin_result) = tokio::join!(http_task, admin_task);
    if let Err(err) = http_result.expect("http server task panicked") {
        tracing::error!(error = %err, "http server exited with error");
    }
    if let Err(err) = admin_result.expect("admin server task panicked") {
        tracing::error!(error = %err, "admin server exited with error");
    }
}
