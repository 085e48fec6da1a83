use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Async batch-processing job record. Submitted as `pending`, picked up by a
/// background worker, polled until terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub agent_id: String,
    pub status: JobStatus,
    pub job_type: String,
    pub total_items: i64,
    pub completed_items: i64,
    pub failed_items: i64,
    /// Validated submission payload (session ids, policy ids, flags)
    pub input: Value,
    /// One record per processed item
    pub results: Vec<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub const TYPE_BATCH_EVALUATE: &'static str = "batch_evaluate";

    pub fn progress_percent(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.completed_items as f64 / self.total_items as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(total: i64, completed: i64) -> ProcessingJob {
        ProcessingJob {
            id: "j1".to_string(),
            agent_id: "billing".to_string(),
            status: JobStatus::Running,
            job_type: ProcessingJob::TYPE_BATCH_EVALUATE.to_string(),
            total_items: total,
            completed_items: completed,
            failed_items: 0,
            input: Value::Null,
            results: vec![],
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn progress_is_zero_for_empty_job() {
        assert_eq!(job(0, 0).progress_percent(), 0.0);
    }

    #[test]
    fn progress_tracks_completed_ratio() {
        assert_eq!(job(4, 1).progress_percent(), 25.0);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
