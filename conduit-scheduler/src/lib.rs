//! Background task scheduler for CONDUIT.
//!
//! Provides interval, cron, and delayed task execution driven by a single
//! [`CancellationToken`], shared by the event-logger flusher (`Interval`) and
//! workflow-DSL `SCHEDULE` groups (`Cron`).

mod types;

pub use types::{extract_tasks, ScheduleConfig, ScheduledResult, ScheduledTask, ScheduledTaskDef};

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use conduit_core::http::StatusCode;
use tokio_util::sync::CancellationToken;

/// Handle to the scheduler runtime, extractable as an Axum handler parameter
/// to check status or trigger cancellation from within a route.
#[derive(Clone)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SchedulerHandle {
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            parts
                .extensions
                .get::<SchedulerHandle>()
                .cloned()
                .ok_or((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SchedulerHandle extension not installed",
                ))
        }
    }
}

// ── ScheduledJobRegistry ──────────────────────────────────────────────────

/// Information about a registered scheduled job, surfaced by the admin
/// control plane's `showConfig`/`nodeInfo`-adjacent inspection commands.
#[derive(Clone, Debug)]
pub struct ScheduledJobInfo {
    pub name: String,
    pub schedule: String,
}

/// Registry of scheduled jobs, queryable at runtime.
#[derive(Clone)]
pub struct ScheduledJobRegistry {
    inner: Arc<Mutex<Vec<ScheduledJobInfo>>>,
}

impl ScheduledJobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn register(&self, info: ScheduledJobInfo) {
        self.inner.lock().unwrap().push(info);
    }

    pub fn list_jobs(&self) -> Vec<ScheduledJobInfo> {
        self.inner.lock().unwrap().clone()
    }
}

impl Default for ScheduledJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a schedule config as a human-readable string (used by the job
/// registry and admin `list`/`listActions`-adjacent output).
pub fn format_schedule(config: &ScheduleConfig) -> String {
    match config {
        ScheduleConfig::Interval(d) => format!("every {}s", d.as_secs()),
        ScheduleConfig::IntervalWithDelay {
            interval,
            initial_delay,
        } => format!(
            "every {}s (delay {}s)",
            interval.as_secs(),
            initial_delay.as_secs()
        ),
        ScheduleConfig::Cron(expr) => format!("cron: {expr}"),
    }
}

/// Start a batch of type-erased scheduled tasks, registering each one in
/// `job_registry` before spawning its driving loop under `token`.
pub fn start_scheduled_tasks(
    boxed_tasks: Vec<Box<dyn Any + Send>>,
    token: CancellationToken,
    job_registry: &ScheduledJobRegistry,
) {
    let tasks = extract_tasks(boxed_tasks);
    if tasks.is_empty() {
        return;
    }

    for task in &tasks {
        job_registry.register(ScheduledJobInfo {
            name: task.name().to_string(),
            schedule: format_schedule(task.schedule()),
        });
    }

    tracing::info!(count = tasks.len(), "starting scheduled tasks");
    for task in tasks {
        task.start(token.clone());
    }
}
