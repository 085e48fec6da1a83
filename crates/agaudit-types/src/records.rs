use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored policy evaluation. At most one current row exists per
/// `(agent, session, policy)`; re-evaluation replaces the prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub agent_id: String,
    pub session_id: String,
    pub policy_id: i64,
    pub is_compliant: bool,
    /// Violation records when non-compliant, compliance details otherwise
    pub details: Vec<Value>,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Stale iff the policy was edited after this evaluation was computed
    pub fn is_stale_against(&self, policy_updated_at: DateTime<Utc>) -> bool {
        policy_updated_at > self.evaluated_at
    }
}

/// Insert form for an evaluation (id and timestamp assigned by the store)
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub session_id: String,
    pub policy_id: i64,
    pub is_compliant: bool,
    pub details: Vec<Value>,
}

/// A canonical tool-usage shape shared by a set of sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVariant {
    pub id: i64,
    pub agent_id: String,
    /// Hex SHA-256 over the normalized sequence; the identity of the variant
    pub signature: String,
    pub name: String,
    pub normalized_sequence: Vec<String>,
    pub sequence_display: String,
    pub session_ids: Vec<String>,
    pub tool_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Reserved transition endpoint prepended before every raw sequence
pub const TRANSITION_START: &str = "_start";
/// Reserved transition endpoint appended after every raw sequence
pub const TRANSITION_END: &str = "_end";

/// A directed, counted tool-to-tool edge. `variant_id = None` is the
/// aggregate across all variants for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTransition {
    pub id: i64,
    pub agent_id: String,
    pub from_tool: String,
    pub to_tool: String,
    pub count: i64,
    pub variant_id: Option<i64>,
}

/// Session-level compliance state. Only `Resolved` is user-written;
/// `Compliant` / `Issues` are derived by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Compliant,
    Issues,
    Resolved,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::Issues => "issues",
            ComplianceStatus::Resolved => "resolved",
        }
    }
}

/// Persisted resolution marker keyed by `(agent, session)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusRecord {
    pub session_id: String,
    pub agent_id: String,
    pub compliance_status: Option<ComplianceStatus>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionStatusRecord {
    pub fn is_resolved(&self) -> bool {
        self.compliance_status == Some(ComplianceStatus::Resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn staleness_compares_policy_edit_time() {
        let evaluation = Evaluation {
            id: 1,
            agent_id: "billing".to_string(),
            session_id: "s1".to_string(),
            policy_id: 7,
            is_compliant: true,
            details: vec![],
            evaluated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };

        let before = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap();
        assert!(!evaluation.is_stale_against(before));
        assert!(evaluation.is_stale_against(after));
    }
}
