//! Task shapes shared by the scheduler runtime.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// How a scheduled task's recurrence is expressed.
#[derive(Debug, Clone)]
pub enum ScheduleConfig {
    /// Fire immediately, then every `Duration`.
    Interval(Duration),
    /// Wait `initial_delay`, then fire every `interval`.
    IntervalWithDelay {
        interval: Duration,
        initial_delay: Duration,
    },
    /// A six-field (seconds-resolution) cron expression, evaluated in UTC.
    Cron(String),
}

/// Blanket-implemented on a scheduled task's return value so outcomes can be
/// logged uniformly regardless of whether the task is fallible.
pub trait ScheduledResult {
    fn log_if_err(&self, task_name: &str);
}

impl ScheduledResult for () {
    fn log_if_err(&self, _task_name: &str) {}
}

impl<E: std::fmt::Display> ScheduledResult for Result<(), E> {
    fn log_if_err(&self, task_name: &str) {
        if let Err(err) = self {
            tracing::warn!(task = task_name, error = %err, "scheduled task execution failed");
        }
    }
}

/// Object-safe handle to a runnable scheduled task. Implemented by
/// [`ScheduledTaskDef`]; callers hold `Box<dyn ScheduledTask>` once the
/// concrete state type has been erased.
pub trait ScheduledTask: Send {
    fn name(&self) -> &str;
    fn schedule(&self) -> &ScheduleConfig;
    /// Spawn the task's driving loop, honoring `token` for cancellation.
    fn start(self: Box<Self>, token: CancellationToken);
}

/// A named, stateful recurring task. `state` is cloned for every execution so
/// the task closure can own a fresh copy (typically a cheap `Arc`/handle clone).
pub struct ScheduledTaskDef<T> {
    pub name: String,
    pub schedule: ScheduleConfig,
    pub state: T,
    pub task: Box<dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>,
}

impl<T: Clone + Send + Sync + 'static> ScheduledTask for ScheduledTaskDef<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    fn start(self: Box<Self>, token: CancellationToken) {
        let ScheduledTaskDef {
            name,
            schedule,
            state,
            task,
        } = *self;

        tokio::spawn(async move {
            match schedule {
                ScheduleConfig::Interval(interval) => {
                    run_interval(&name, interval, &state, &task, &token).await;
                }
                ScheduleConfig::IntervalWithDelay {
                    interval,
                    initial_delay,
                } => {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(initial_delay) => {}
                    }
                    run_interval(&name, interval, &state, &task, &token).await;
                }
                ScheduleConfig::Cron(expr) => {
                    run_cron(&name, &expr, &state, &task, &token).await;
                }
            }
        });
    }
}

async fn run_interval<T: Clone>(
    name: &str,
    interval: Duration,
    state: &T,
    task: &(dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync),
    token: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let out = task(state.clone()).await;
                out.log_if_err(name);
            }
        }
    }
}

async fn run_cron<T: Clone>(
    name: &str,
    expr: &str,
    state: &T,
    task: &(dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync),
    token: &CancellationToken,
) {
    let schedule = match cron::Schedule::from_str(expr) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(task = name, %expr, error = %err, "invalid cron expression, task will never fire");
            return;
        }
    };

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            break;
        };
        let now = Utc::now();
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                let out = task(state.clone()).await;
                out.log_if_err(name);
            }
        }
    }
}

/// Downcast a batch of type-erased tasks (each a `Box<dyn ScheduledTask>`
/// hidden behind `Box<dyn Any + Send>`) back to runnable trait objects.
/// Entries that aren't a boxed `ScheduledTask` are silently skipped.
pub fn extract_tasks(boxed: Vec<Box<dyn Any + Send>>) -> Vec<Box<dyn ScheduledTask>> {
    boxed
        .into_iter()
        .filter_map(|b| b.downcast::<Box<dyn ScheduledTask>>().ok().map(|b| *b))
        .collect()
}
