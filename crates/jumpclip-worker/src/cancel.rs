//! Cooperative cancel checks between jumps.
//!
//! Only the job's own `cancelRequested` flag stops it. Worker shutdown stops
//! the consumer from taking new messages, but a job in progress runs to the end.

use std::sync::Arc;

use jumpclip_models::JobId;
use jumpclip_store::JobStore;
use tracing::warn;

#[derive(Clone)]
pub struct CancelToken {
    jobs: Arc<dyn JobStore>,
}

impl CancelToken {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    /// Re-read the job's cancel flag. A store read failure does not stop the
    /// job; it is logged and ignored.
    pub async fn is_requested(&self, job_id: &JobId) -> bool {
        match self.jobs.get(job_id).await {
            Ok(Some(job)) => job.cancel_requested,
            Ok(None) => false,
            Err(e) => {
                warn!(job_id = %job_id, "Cancel check failed: {}", e);
                false
            }
        }
    }
}
