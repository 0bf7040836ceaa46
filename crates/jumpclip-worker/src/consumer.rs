//! Queue consumer loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jumpclip_models::{JobMessage, JobStatus};
use jumpclip_queue::{Delivery, MessageQueue};
use jumpclip_store::{ClaimOutcome, JobStore};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::metrics as worker_metrics;
use crate::retry::FailureTracker;
use crate::runner::{JobOutcome, JobRunner};

/// Why a message was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReason {
    /// Body was not a job message
    Malformed,
    /// No job record with that id
    JobNotFound,
    /// Another worker holds or finished the job
    NotClaimable(JobStatus),
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked(AckReason),
    /// Left unacknowledged; the queue redelivers after its visibility timeout
    Abandoned,
}

impl Disposition {
    fn label(&self) -> &'static str {
        match self {
            Disposition::Acked(AckReason::Malformed) => "malformed",
            Disposition::Acked(AckReason::JobNotFound) => "job_not_found",
            Disposition::Acked(AckReason::NotClaimable(_)) => "not_claimable",
            Disposition::Acked(AckReason::Completed) => "completed",
            Disposition::Acked(AckReason::Cancelled) => "cancelled",
            Disposition::Abandoned => "abandoned",
        }
    }
}

/// Receives job messages one at a time and drives them through the runner.
pub struct JobConsumer {
    queue: Arc<dyn MessageQueue>,
    jobs: Arc<dyn JobStore>,
    runner: JobRunner,
    receive_wait: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        jobs: Arc<dyn JobStore>,
        runner: JobRunner,
        receive_wait: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            jobs,
            runner,
            receive_wait,
            shutdown,
        }
    }

    /// Consume until the shutdown signal fires. A job already claimed runs to
    /// completion before the loop exits.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.clone();
        let mut receive_failures = FailureTracker::new(5);
        info!("Consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                received = self.queue.receive(self.receive_wait) => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    receive_failures.record_success();
                    self.handle_delivery(&delivery).await;
                }
                Ok(None) => receive_failures.record_success(),
                Err(e) => {
                    if receive_failures.record_failure() {
                        error!("Queue receive failed: {}", e);
                    }
                    let pause = receive_failures.backoff();
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }

        info!("Consumer stopped");
    }

    /// Process one delivery end to end and settle it with the queue.
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Disposition {
        let disposition = self.dispatch(delivery).await;

        if let Disposition::Acked(reason) = disposition {
            if let Err(e) = self.queue.ack(delivery).await {
                warn!(
                    message_id = %delivery.id,
                    "Failed to ack message ({:?}); it will be redelivered: {}", reason, e
                );
            }
        }
        worker_metrics::record_message(disposition.label());
        debug!(message_id = %delivery.id, "Message {}", disposition.label());
        disposition
    }

    async fn dispatch(&self, delivery: &Delivery) -> Disposition {
        let message = match JobMessage::parse(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(message_id = %delivery.id, "Dropping malformed message: {}", e);
                return Disposition::Acked(AckReason::Malformed);
            }
        };
        let job_id = message.job_id;

        let claimed = match self.jobs.claim(&job_id, Utc::now()).await {
            Ok(ClaimOutcome::Claimed(job)) => job,
            Ok(ClaimOutcome::NotFound) => {
                warn!(job_id = %job_id, "Message references an unknown job");
                return Disposition::Acked(AckReason::JobNotFound);
            }
            Ok(ClaimOutcome::NotClaimable(status)) => {
                info!(job_id = %job_id, "Job is {}, skipping redelivery", status);
                return Disposition::Acked(AckReason::NotClaimable(status));
            }
            Err(e) => {
                error!(job_id = %job_id, "Claim failed: {}", e);
                return Disposition::Abandoned;
            }
        };

        if delivery.receive_count > 1 {
            info!(
                job_id = %job_id,
                "Claimed on delivery attempt {}", delivery.receive_count
            );
        }

        let cancel = CancelToken::new(self.jobs.clone());
        match self.runner.execute(&claimed, &cancel).await {
            Ok(JobOutcome::Succeeded { .. }) => Disposition::Acked(AckReason::Completed),
            Ok(JobOutcome::Cancelled { .. }) => Disposition::Acked(AckReason::Cancelled),
            Err(_) => Disposition::Abandoned,
        }
    }
}
