use agaudit_types::JobStatus;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A directed edge with its observed count, ready for insertion
#[derive(Debug, Clone)]
pub struct TransitionSeed {
    pub from_tool: String,
    pub to_tool: String,
    pub count: i64,
}

/// One variant bucket produced by the pattern extractor, carrying its
/// per-variant transition counts. Persisted atomically by
/// [`crate::StoreHandle::replace_variants`].
#[derive(Debug, Clone)]
pub struct VariantSeed {
    pub signature: String,
    pub name: String,
    pub normalized_sequence: Vec<String>,
    pub sequence_display: String,
    pub session_ids: Vec<String>,
    pub tool_count: usize,
    pub transitions: Vec<TransitionSeed>,
}

/// Partial update applied to a processing job. Fields left as `None` are
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub completed_items: Option<i64>,
    pub failed_items: Option<i64>,
    pub results: Option<Vec<Value>>,
    pub error_message: Option<Option<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        JobUpdate {
            status: Some(status),
            ..Default::default()
        }
    }
}
