//! Job queue using Redis Streams.
//!
//! Messages live in one stream read through a consumer group. An entry
//! that stays pending longer than the visibility timeout is claimed by the
//! next receiver; once its delivery count reaches `max_receives` it is copied
//! to the dead-letter stream and removed from the main stream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamRangeReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::queue::{DeadLetter, DeadLetterSink, Delivery, MessageQueue};

const BODY_FIELD: &str = "body";

/// Pending entries inspected per receive.
const RECLAIM_BATCH: usize = 10;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub dlq_stream_name: String,
    pub consumer_group: String,
    /// Unique per worker process
    pub consumer_name: String,
    pub visibility_timeout: Duration,
    pub max_receives: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "jumpclip:jobs".to_string(),
            dlq_stream_name: "jumpclip:jobs:dlq".to_string(),
            consumer_group: "jumpclip-workers".to_string(),
            consumer_name: format!("worker-{}", std::process::id()),
            visibility_timeout: Duration::from_secs(300),
            max_receives: 3,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("JUMPCLIP_STREAM").unwrap_or(defaults.stream_name),
            dlq_stream_name: std::env::var("JUMPCLIP_DLQ_STREAM")
                .unwrap_or(defaults.dlq_stream_name),
            consumer_group: std::env::var("JUMPCLIP_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            consumer_name: std::env::var("JUMPCLIP_CONSUMER_NAME")
                .unwrap_or(defaults.consumer_name),
            visibility_timeout: std::env::var("JUMPCLIP_VISIBILITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            max_receives: std::env::var("JUMPCLIP_MAX_RECEIVES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_receives),
        }
    }
}

pub struct RedisJobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisJobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Create the consumer group (and stream) if missing.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }
        Ok(())
    }

    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    /// Take over an entry whose previous receiver let the visibility timeout lapse.
    async fn reclaim_expired(&self, conn: &mut MultiplexedConnection) -> QueueResult<Option<Delivery>> {
        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(RECLAIM_BATCH)
            .query_async(conn)
            .await?;

        for entry in pending.ids {
            let delivered = entry.times_delivered as u32;
            if delivered >= self.config.max_receives {
                self.dead_letter(conn, &entry.id, delivered).await?;
                continue;
            }

            let claimed: StreamClaimReply = redis::cmd("XCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_name)
                .arg(min_idle_ms)
                .arg(&entry.id)
                .query_async(conn)
                .await?;

            // Another receiver may have claimed it between XPENDING and XCLAIM.
            if let Some(stream_id) = claimed.ids.into_iter().next() {
                info!(
                    message_id = %stream_id.id,
                    receive_count = delivered + 1,
                    "Reclaimed message after visibility timeout"
                );
                return Ok(Some(to_delivery(stream_id, delivered + 1)));
            }
        }
        Ok(None)
    }

    async fn dead_letter(
        &self,
        conn: &mut MultiplexedConnection,
        message_id: &str,
        receive_count: u32,
    ) -> QueueResult<()> {
        let range: StreamRangeReply = conn
            .xrange(&self.config.stream_name, message_id, message_id)
            .await?;
        let body = range
            .ids
            .first()
            .and_then(|e| e.get::<String>(BODY_FIELD))
            .unwrap_or_default();

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(&body)
            .arg("original_id")
            .arg(message_id)
            .arg("receive_count")
            .arg(receive_count)
            .arg("dead_lettered_at")
            .arg(Utc::now().to_rfc3339())
            .query_async::<String>(conn)
            .await?;

        self.delete(conn, message_id).await?;
        warn!(message_id, receive_count, "Moved message to dead-letter stream");
        Ok(())
    }

    async fn delete(&self, conn: &mut MultiplexedConnection, message_id: &str) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }
}

fn to_delivery(entry: StreamId, receive_count: u32) -> Delivery {
    Delivery {
        body: entry.get::<String>(BODY_FIELD).unwrap_or_default(),
        id: entry.id,
        receive_count,
    }
}

fn to_dead_letter(entry: &StreamId) -> DeadLetter {
    let dead_lettered_at = entry
        .get::<String>("dead_lettered_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    DeadLetter {
        id: entry.id.clone(),
        body: entry.get::<String>(BODY_FIELD).unwrap_or_default(),
        receive_count: entry.get::<u32>("receive_count").unwrap_or(0),
        dead_lettered_at,
    }
}

#[async_trait]
impl MessageQueue for RedisJobQueue {
    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        let mut conn = self.conn().await?;

        if let Some(delivery) = self.reclaim_expired(&mut conn).await? {
            return Ok(Some(delivery));
        }

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(wait.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entry = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next();

        Ok(entry.map(|e| {
            debug!(message_id = %e.id, "Received message");
            to_delivery(e, 1)
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        self.delete(&mut conn, &delivery.id).await?;
        debug!(message_id = %delivery.id, "Acknowledged message");
        Ok(())
    }

    async fn send(&self, body: &str) -> QueueResult<String> {
        let mut conn = self.conn().await?;
        let id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;
        Ok(id)
    }
}

#[async_trait]
impl DeadLetterSink for RedisJobQueue {
    async fn dead_letters(&self, limit: usize) -> QueueResult<Vec<DeadLetter>> {
        let mut conn = self.conn().await?;
        let range: StreamRangeReply = conn
            .xrange_count(&self.config.dlq_stream_name, "-", "+", limit)
            .await?;
        Ok(range.ids.iter().map(to_dead_letter).collect())
    }

    async fn remove_dead_letter(&self, id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let _: u64 = conn.xdel(&self.config.dlq_stream_name, &[id]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "jumpclip:jobs");
        assert_eq!(config.dlq_stream_name, "jumpclip:jobs:dlq");
        assert_eq!(config.consumer_group, "jumpclip-workers");
        assert_eq!(config.visibility_timeout, Duration::from_secs(300));
        assert_eq!(config.max_receives, 3);
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = QueueConfig {
            redis_url: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(RedisJobQueue::new(config).is_err());
    }
}
