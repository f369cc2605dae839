//! The job record and its stage/status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identifier, unique and immutable once assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The pipeline phase a job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    ExtractingAudio,
    Transcribing,
    ScreeningNsfw,
    Upscaling,
    Transcoding,
    Completed,
    Failed,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Coarse lifecycle state: `queued → processing → completed | failed`.
///
/// No transition skips `processing`, and nothing transitions out of a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one tracked job, as returned by status lookups and consumed by
/// the (external) API layer.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub stage: JobStage,
    pub status: JobStatus,
    /// Artifact reference published on success.
    pub result: Option<String>,
    /// Failure message recorded on error.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn queued(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage: JobStage::Queued,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStage::Completed.is_terminal());
        assert!(!JobStage::Upscaling.is_terminal());
    }

    #[test]
    fn snapshot_serializes_snake_case() {
        let job = Job::queued(JobId::generate());
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["stage"], "queued");
        assert_eq!(json["status"], "queued");
        assert!(json["error"].is_null());
    }
}
