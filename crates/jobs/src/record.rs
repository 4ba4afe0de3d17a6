// crates/jobs/src/record.rs
//! The job record: the status document a polling caller reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle. `Done` and `Error` are terminal; a record never leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Percent-plus-stage progress, monotonically non-decreasing for the life of
/// the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    pub percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Stable error taxonomy mirrored from the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub operation: String,
    pub status: JobStatus,
    pub progress: ProgressInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Where the finished artifact can be fetched, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Operation-specific result details, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the record falls out of the store; the store maintains this from
    /// its TTL on every write.
    pub expires_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh record for a job that was just handed to the queue.
    pub fn queued(job_id: impl Into<String>, operation: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            operation: operation.into(),
            status: JobStatus::Queued,
            progress: ProgressInfo {
                percent: 0,
                stage: Some("queued".to_string()),
                message: None,
            },
            error: None,
            download_url: None,
            meta: None,
            created_at: now,
            updated_at: now,
            expires_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_queued_record_shape() {
        let record = JobRecord::queued("job-1", "combine");
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.progress.percent, 0);
        assert_eq!(record.progress.stage.as_deref(), Some("queued"));
        assert!(record.error.is_none());
        assert!(record.download_url.is_none());
    }

    #[test]
    fn test_wire_casing() {
        let record = JobRecord::queued("job-1", "extract");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"jobId\":\"job-1\""));
        assert!(json.contains("\"status\":\"queued\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"expiresAt\""));
        // Unset optionals stay off the wire.
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("\"downloadUrl\""));
    }
}
