//! Structured job logging utilities.

use jumpclip_models::JobId;
use tracing::{error, info, warn, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines; anything else prints human-readable
/// output. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jumpclip=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

/// Job-scoped logger carrying the job id and owner on every line.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    owner: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, owner: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, owner = %self.owner, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, owner = %self.owner, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, owner = %self.owner, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, owner = %self.owner, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, owner = %self.owner, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span to instrument the whole job with.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, owner = %self.owner)
    }
}
