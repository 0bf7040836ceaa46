//! Transport-neutral queue interfaces.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::QueueResult;

/// One receipt of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport message id, stable across redeliveries
    pub id: String,
    pub body: String,
    /// 1 on first receipt
    pub receive_count: u32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Wait up to `wait` for a message. `None` when nothing arrived.
    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>>;

    /// Delete the message. Unacked messages are redelivered after the
    /// visibility timeout.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Enqueue a body; returns the message id.
    async fn send(&self, body: &str) -> QueueResult<String>;
}

/// A message that exceeded its receive budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Id in the dead-letter sink
    pub id: String,
    pub body: String,
    pub receive_count: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Oldest first.
    async fn dead_letters(&self, limit: usize) -> QueueResult<Vec<DeadLetter>>;

    async fn remove_dead_letter(&self, id: &str) -> QueueResult<()>;
}
