//! At-least-once message queue for job messages.
//!
//! This crate provides:
//! - [`MessageQueue`]: receive with a bounded wait, ack, send
//! - [`DeadLetterSink`]: inspection of messages that exhausted their receives
//! - [`RedisJobQueue`] over Redis Streams and [`MemoryQueue`] in-process
//!
//! A received message that is not acked becomes visible again after the
//! visibility timeout. Once a message would be received more than
//! `max_receives` times it moves to the dead-letter sink instead.

pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_queue;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use queue::{DeadLetter, DeadLetterSink, Delivery, MessageQueue};
pub use redis_queue::{QueueConfig, RedisJobQueue};
