//! Treats the job store itself as the queue.
//!
//! Used when no message transport is deployed: every queued job is a pending
//! message. Claiming is what makes delivery exclusive, so acknowledging is a
//! no-op and a job left `queued` is simply offered again on the next poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jumpclip_models::{JobId, JobMessage, JobStatus};
use jumpclip_queue::{Delivery, MessageQueue, QueueError, QueueResult};
use jumpclip_store::JobStore;
use tokio::time::Instant;

pub struct StorePollingQueue {
    jobs: Arc<dyn JobStore>,
    poll_interval: Duration,
}

impl StorePollingQueue {
    pub fn new(jobs: Arc<dyn JobStore>, poll_interval: Duration) -> Self {
        Self {
            jobs,
            poll_interval,
        }
    }
}

#[async_trait]
impl MessageQueue for StorePollingQueue {
    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;

        loop {
            let oldest = self
                .jobs
                .list_by_status(JobStatus::Queued, 1)
                .await
                .map_err(|e| QueueError::connection_failed(e.to_string()))?;

            if let Some(job) = oldest.into_iter().next() {
                let body = JobMessage::for_job(&job)
                    .to_json()
                    .map_err(|e| QueueError::MalformedEntry {
                        id: job.job_id.to_string(),
                        message: e.to_string(),
                    })?;
                return Ok(Some(Delivery {
                    id: job.job_id.to_string(),
                    body,
                    receive_count: 1,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, _delivery: &Delivery) -> QueueResult<()> {
        Ok(())
    }

    /// The job must already be stored as `queued`; the message only names it.
    async fn send(&self, body: &str) -> QueueResult<String> {
        let message =
            JobMessage::parse(body).map_err(|e| QueueError::enqueue_failed(e.to_string()))?;
        let job_id: JobId = message.job_id;

        match self.jobs.get(&job_id).await {
            Ok(Some(job)) if job.status == JobStatus::Queued => Ok(job_id.to_string()),
            Ok(Some(job)) => Err(QueueError::enqueue_failed(format!(
                "job {} is {}, not queued",
                job_id, job.status
            ))),
            Ok(None) => Err(QueueError::enqueue_failed(format!("job {} not found", job_id))),
            Err(e) => Err(QueueError::connection_failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jumpclip_models::{Job, JobTarget, RenderOptions};
    use jumpclip_store::MemoryStore;

    fn queue(store: Arc<MemoryStore>) -> StorePollingQueue {
        StorePollingQueue::new(store, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_empty_store_times_out() {
        let q = queue(Arc::new(MemoryStore::new()));
        let got = q.receive(Duration::from_millis(30)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_offers_oldest_queued_job_until_claimed() {
        let store = Arc::new(MemoryStore::new());
        let mut older = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        older.queued_at = Utc::now() - chrono::Duration::seconds(60);
        let newer = Job::queued("u1", JobTarget::jump("j1"), RenderOptions::default());
        store.put(&newer).await.unwrap();
        store.put(&older).await.unwrap();

        let q = queue(store.clone());
        let delivery = q.receive(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(delivery.id, older.job_id.to_string());
        assert_eq!(JobMessage::parse(&delivery.body).unwrap().job_id, older.job_id);

        store.claim(&older.job_id, Utc::now()).await.unwrap();
        let delivery = q.receive(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(delivery.id, newer.job_id.to_string());
    }

    #[tokio::test]
    async fn test_send_requires_queued_job() {
        let store = Arc::new(MemoryStore::new());
        let job = Job::queued("u1", JobTarget::session("s1"), RenderOptions::default());
        let q = queue(store.clone());

        let body = JobMessage::for_job(&job).to_json().unwrap();
        assert!(q.send(&body).await.is_err());

        store.put(&job).await.unwrap();
        assert_eq!(q.send(&body).await.unwrap(), job.job_id.to_string());
        assert!(q.send("not json").await.is_err());
    }
}
