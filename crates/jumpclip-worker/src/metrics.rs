//! Worker metrics and the Prometheus exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

pub mod names {
    /// Finished jobs by `outcome`
    pub const JOBS_TOTAL: &str = "jumpclip_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "jumpclip_job_duration_seconds";
    pub const CLIPS_RENDERED_TOTAL: &str = "jumpclip_clips_rendered_total";
    /// Queue messages by `disposition`
    pub const MESSAGES_TOTAL: &str = "jumpclip_messages_total";
}

pub fn record_job(outcome: &'static str, elapsed: Duration) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_clip_rendered() {
    counter!(names::CLIPS_RENDERED_TOTAL).increment(1);
}

pub fn record_message(disposition: &'static str) {
    counter!(names::MESSAGES_TOTAL, "disposition" => disposition).increment(1);
}

/// Serve `/metrics` on `0.0.0.0:{port}`. Must run inside the tokio runtime.
pub fn install_prometheus(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Prometheus exporter: {e}")))
}
