//! Redis-backed event-logger queue: a single writer queue and
//! a periodic flusher, distinct from [`crate::EventBus`]'s in-process
//! pub/sub. Rule actions (`INSERT INTO`, `UPDATE ... WHERE`, `TRIGGER`)
//! enqueue here instead of touching the database inline, so an inbound
//! rule never blocks the request on a DB round-trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One queued mutation, matching the wire shape `{op, ...}` serialized
/// onto the Redis list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum QueueItem {
    Insert { cfg: Value, entity: String, payload: Value },
    Update { cfg: Value, sql: String, params: Vec<Value> },
    /// Destination for the `TRIGGER` action, which always enqueues
    /// regardless of any `WHERE`-style condition.
    Trigger { object: Value },
}

#[derive(Debug)]
pub enum EventsError {
    Redis(redis::RedisError),
    Serde(serde_json::Error),
    /// A dequeued item failed to apply against the backing store — the
    /// host's `EventSink::apply` surfaces its own error as a message here
    /// since the sink's error type is opaque to this crate.
    Sink(String),
}

impl std::fmt::Display for EventsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventsError::Redis(e) => write!(f, "event queue redis error: {e}"),
            EventsError::Serde(e) => write!(f, "event queue serialization error: {e}"),
            EventsError::Sink(msg) => write!(f, "event sink apply failed: {msg}"),
        }
    }
}

impl std::error::Error for EventsError {}

impl From<redis::RedisError> for EventsError {
    fn from(e: redis::RedisError) -> Self {
        EventsError::Redis(e)
    }
}

impl From<serde_json::Error> for EventsError {
    fn from(e: serde_json::Error) -> Self {
        EventsError::Serde(e)
    }
}

/// Executes a dequeued [`QueueItem`] against the real backing store (the
/// gateway's `DbFacade`). Implemented by the host, not this crate.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn apply(&self, item: QueueItem) -> Result<(), EventsError>;
}

/// Redis LPUSH/LRANGE/LTRIM-backed queue with a non-reentrant
/// batch-size-triggered flush and a periodic flusher.
pub struct EventLoggerQueue {
    client: redis::Client,
    queue_key: String,
    batch_size: usize,
    flush_interval: Duration,
    flushing: Arc<AtomicBool>,
}

impl EventLoggerQueue {
    pub fn new(client: redis::Client, queue_key: impl Into<String>, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
            batch_size: batch_size.max(1),
            flush_interval,
            flushing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_url(
        url: &str,
        queue_key: impl Into<String>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Result<Self, redis::RedisError> {
        Ok(Self::new(redis::Client::open(url)?, queue_key, batch_size, flush_interval))
    }

    async fn connection(&self) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// `log(cfg, entity, payload)` — serialize and LPUSH; triggers an
    /// immediate flush if the queue has reached `batchSize`.
    pub async fn log(&self, cfg: Value, entity: &str, payload: Value, sink: Arc<dyn EventSink>) -> Result<(), EventsError> {
        self.push(QueueItem::Insert { cfg, entity: entity.to_string(), payload }, sink).await
    }

    pub async fn log_update(
        &self,
        cfg: Value,
        sql: &str,
        params: Vec<Value>,
        sink: Arc<dyn EventSink>,
    ) -> Result<(), EventsError> {
        self.push(QueueItem::Update { cfg, sql: sql.to_string(), params }, sink).await
    }

    /// `TRIGGER` always enqueues, regardless of queue depth relative to
    /// `batchSize` — the caller still passes `sink` so a length crossing
    /// the threshold flushes promptly.
    pub async fn trigger(&self, object: Value, sink: Arc<dyn EventSink>) -> Result<(), EventsError> {
        self.push(QueueItem::Trigger { object }, sink).await
    }

    async fn push(&self, item: QueueItem, sink: Arc<dyn EventSink>) -> Result<(), EventsError> {
        let serialized = serde_json::to_string(&item)?;
        let mut conn = self.connection().await?;
        let len: i64 = redis::cmd("LPUSH").arg(&self.queue_key).arg(serialized).query_async(&mut conn).await?;
        if len as usize >= self.batch_size {
            self.spawn_flush(sink);
        }
        Ok(())
    }

    /// Spawn a flush if one isn't already running (non-reentrant).
    fn spawn_flush(&self, sink: Arc<dyn EventSink>) {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = self.client.clone();
        let queue_key = self.queue_key.clone();
        let batch_size = self.batch_size;
        let flushing = self.flushing.clone();
        tokio::spawn(async move {
            if let Err(err) = flush_once(&client, &queue_key, batch_size, sink.as_ref()).await {
                tracing::warn!(error = %err, "event logger flush failed");
            }
            flushing.store(false, Ordering::SeqCst);
        });
    }

    /// Drain the queue once against `sink`. Used both as the action a
    /// `conduit-scheduler` interval task repeats for the periodic flush,
    /// and as the final drain on shutdown. This queue is at-most-once:
    /// items still in flight when the process exits are lost, which is
    /// the operator-accepted tradeoff recorded in DESIGN.md.
    pub async fn shutdown(&self, sink: Arc<dyn EventSink>) -> Result<usize, EventsError> {
        flush_once(&self.client, &self.queue_key, self.batch_size, sink.as_ref()).await
    }
}

/// `LRANGE 0 batchSize-1`, `LTRIM batchSize -1`, then execute each item
/// concurrently through `sink`. Errors are logged per-item; items are
/// never re-enqueued (at-most-once delivery).
async fn flush_once(
    client: &redis::Client,
    queue_key: &str,
    batch_size: usize,
    sink: &dyn EventSink,
) -> Result<usize, EventsError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let upper = (batch_size as isize) - 1;
    let raw: Vec<String> = redis::cmd("LRANGE").arg(queue_key).arg(0).arg(upper).query_async(&mut conn).await?;
    if raw.is_empty() {
        return Ok(0);
    }
    let _: () = redis::cmd("LTRIM").arg(queue_key).arg(batch_size as isize).arg(-1).query_async(&mut conn).await?;

    let items: Vec<QueueItem> = raw
        .iter()
        .filter_map(|line| match serde_json::from_str::<QueueItem>(line) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(error = %err, line = %line, "dropping unparseable event-logger item");
                None
            }
        })
        .collect();

    let applied = items.len();
    let results = join_all(items.into_iter().map(|item| async { sink.apply(item).await })).await;
    for result in results {
        if let Err(err) = result {
            tracing::warn!(error = %err, "event-logger item execution failed, dropped (at-most-once)");
        }
    }
    Ok(applied)
}
