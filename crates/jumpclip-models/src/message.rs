//! Queue message body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::ids::JobId;
use crate::job::{Job, TargetKind};
use crate::options::OptionsBag;

/// Body of a job message. Only `jobId` drives processing; the rest mirrors
/// the job record for consumers that want to route without a store read.
/// `options` stays untyped so a bad bag cannot make the message unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: JobId,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub target_type: Option<TargetKind>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub options: Option<OptionsBag>,
}

fn default_message_type() -> String {
    JobMessage::RENDER_TYPE.to_string()
}

impl JobMessage {
    pub const RENDER_TYPE: &'static str = "render";

    /// Message announcing a queued job.
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            message_type: Self::RENDER_TYPE.to_string(),
            target_type: Some(job.target.kind),
            target_id: Some(job.target.id.clone()),
            owner: Some(job.owner.clone()),
            options: Some(job.options.clone()),
        }
    }

    pub fn parse(body: &str) -> ModelResult<Self> {
        let msg: JobMessage =
            serde_json::from_str(body).map_err(|e| ModelError::invalid_message(e.to_string()))?;
        if msg.job_id.as_str().trim().is_empty() {
            return Err(ModelError::invalid_message("jobId is empty"));
        }
        Ok(msg)
    }

    pub fn to_json(&self) -> ModelResult<String> {
        serde_json::to_string(self).map_err(|e| ModelError::invalid_message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobTarget;
    use crate::options::RenderOptions;

    #[test]
    fn test_parse_full_message() {
        let body = r#"{"jobId":"j-1","type":"render","targetType":"session","targetId":"s1","owner":"u1","options":{"preset":"medium"}}"#;
        let msg = JobMessage::parse(body).unwrap();
        assert_eq!(msg.job_id.as_str(), "j-1");
        assert_eq!(msg.target_type, Some(TargetKind::Session));
        assert_eq!(msg.options.unwrap().resolve().unwrap().preset, crate::Preset::Medium);
    }

    #[test]
    fn test_badly_typed_options_do_not_break_parse() {
        let body = r#"{"jobId":"j-3","options":{"interpolationFps":"60","preset":"veryfast"}}"#;
        let msg = JobMessage::parse(body).unwrap();
        assert_eq!(msg.job_id.as_str(), "j-3");
        assert!(msg.options.unwrap().resolve().is_err());

        let msg = JobMessage::parse(r#"{"jobId":"j-4","options":null}"#).unwrap();
        assert!(msg.options.is_none());
    }

    #[test]
    fn test_parse_minimal_message() {
        let msg = JobMessage::parse(r#"{"jobId":"j-2"}"#).unwrap();
        assert_eq!(msg.message_type, "render");
        assert!(msg.owner.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(JobMessage::parse("not json").is_err());
        assert!(JobMessage::parse(r#"{"type":"render"}"#).is_err());
        assert!(JobMessage::parse(r#"{"jobId":"  "}"#).is_err());
    }

    #[test]
    fn test_for_job_round_trips_through_parse() {
        let job = Job::queued("u1", JobTarget::jump("j9"), RenderOptions::default());
        let body = JobMessage::for_job(&job).to_json().unwrap();
        let msg = JobMessage::parse(&body).unwrap();
        assert_eq!(msg.job_id, job.job_id);
        assert_eq!(msg.target_id.as_deref(), Some("j9"));
    }
}
