use crate::Result;
use agaudit_sessions::SessionStore;
use agaudit_store::Store;
use agaudit_types::{ComplianceStatus, Evaluation, Policy, Severity, UsageTotals};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize)]
pub struct PolicyRollup {
    pub policy_id: i64,
    pub name: String,
    pub severity: Severity,
    pub compliant_count: usize,
    pub total_count: usize,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyRef {
    pub policy_id: i64,
    pub policy_name: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViolatedPolicy {
    pub policy_id: i64,
    pub policy_name: String,
    pub severity: Severity,
    pub violations: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRollup {
    pub session_id: String,
    pub is_compliant: bool,
    pub compliance_status: ComplianceStatus,
    pub is_fully_evaluated: bool,
    pub needs_reprocessing: bool,
    pub evaluated_policy_count: usize,
    pub total_policy_count: usize,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub total_evaluations: usize,
    pub compliant_evaluations: usize,
    pub non_compliant_evaluations: usize,
    pub violation_count: usize,
    pub policies_violated: Vec<ViolatedPolicy>,
    pub policies_passed: Vec<PolicyRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub total_sessions: usize,
    pub processed_sessions: usize,
    pub total_policies: usize,
    pub by_policy: Vec<PolicyRollup>,
    pub sessions: Vec<SessionRollup>,
    pub llm_usage_totals: UsageTotals,
}

/// Latest evaluation per policy id (max evaluated_at, ties broken by row id)
fn latest_by_policy(evaluations: &[Evaluation]) -> HashMap<i64, &Evaluation> {
    let mut latest: HashMap<i64, &Evaluation> = HashMap::new();
    for evaluation in evaluations {
        match latest.get(&evaluation.policy_id) {
            Some(existing)
                if (existing.evaluated_at, existing.id)
                    >= (evaluation.evaluated_at, evaluation.id) => {}
            _ => {
                latest.insert(evaluation.policy_id, evaluation);
            }
        }
    }
    latest
}

/// Recursively collect `llm_usage` mappings out of a details tree
fn collect_llm_usage(value: &Value, totals: &mut UsageTotals) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(usage)) = map.get("llm_usage") {
                totals.absorb(usage);
            }
            for (key, child) in map {
                if key != "llm_usage" {
                    collect_llm_usage(child, totals);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_llm_usage(item, totals);
            }
        }
        _ => {}
    }
}

/// Compute the compliance rollup for one agent: per-policy and per-session
/// counts over the latest evaluation per `(session, policy)`, staleness
/// against policy edit times, resolution state and the LLM usage totals.
pub fn agent_summary(
    store: &Store,
    sessions: &dyn SessionStore,
    agent_id: &str,
) -> Result<AgentSummary> {
    let session_summaries = sessions.list_sessions(agent_id)?;
    let current_session_ids: HashSet<&str> = session_summaries
        .iter()
        .map(|summary| summary.id.as_str())
        .collect();

    let (all_policies, all_evaluations, statuses) = {
        let handle = store.handle()?;
        (
            handle.list_policies(agent_id, false)?,
            handle.list_evaluations_for_agent(agent_id)?,
            handle.list_session_statuses(agent_id)?,
        )
    };

    let enabled_policies: Vec<&Policy> =
        all_policies.iter().filter(|policy| policy.enabled).collect();
    let enabled_ids: HashSet<i64> = enabled_policies.iter().map(|policy| policy.id).collect();
    let policy_by_id: HashMap<i64, &Policy> =
        all_policies.iter().map(|policy| (policy.id, policy)).collect();
    let resolved_sessions: HashMap<&str, _> = statuses
        .iter()
        .filter(|status| status.is_resolved())
        .map(|status| (status.session_id.as_str(), status))
        .collect();

    // Evaluations grouped per existing session; rows for deleted sessions
    // are ignored
    let mut by_session: HashMap<String, Vec<Evaluation>> = HashMap::new();
    for evaluation in all_evaluations {
        if current_session_ids.contains(evaluation.session_id.as_str()) {
            by_session
                .entry(evaluation.session_id.clone())
                .or_default()
                .push(evaluation);
        }
    }

    let mut policy_counts: HashMap<i64, (usize, usize)> = HashMap::new();
    let mut session_rollups = Vec::new();
    let mut usage_totals = UsageTotals::default();
    let mut processed_sessions = 0;

    for summary in &session_summaries {
        let Some(evaluations) = by_session.get(summary.id.as_str()) else {
            continue;
        };
        let latest = latest_by_policy(evaluations);
        let evaluated_ids: HashSet<i64> = latest.keys().copied().collect();

        for (policy_id, evaluation) in &latest {
            if enabled_ids.contains(policy_id) {
                let entry = policy_counts.entry(*policy_id).or_insert((0, 0));
                entry.1 += 1;
                if evaluation.is_compliant {
                    entry.0 += 1;
                }
            }
        }

        // Stale iff any enabled policy was edited after its latest evaluation
        let stale = enabled_policies.iter().any(|policy| {
            latest
                .get(&policy.id)
                .map(|evaluation| evaluation.is_stale_against(policy.updated_at))
                .unwrap_or(false)
        });
        let fully_evaluated = !enabled_ids.is_empty()
            && enabled_ids.iter().all(|id| evaluated_ids.contains(id))
            && !stale;
        if fully_evaluated {
            processed_sessions += 1;
        }

        let total_evaluations = evaluations.len();
        let compliant_evaluations = evaluations.iter().filter(|e| e.is_compliant).count();
        let non_compliant_evaluations = total_evaluations - compliant_evaluations;
        let violation_count = evaluations
            .iter()
            .filter(|e| !e.is_compliant)
            .map(|e| e.details.len())
            .sum();

        let mut policies_violated = Vec::new();
        let mut policies_passed = Vec::new();
        for evaluation in evaluations {
            let Some(policy) = policy_by_id.get(&evaluation.policy_id) else {
                continue;
            };
            if evaluation.is_compliant {
                policies_passed.push(PolicyRef {
                    policy_id: policy.id,
                    policy_name: policy.name.clone(),
                    severity: policy.severity,
                });
            } else {
                policies_violated.push(ViolatedPolicy {
                    policy_id: policy.id,
                    policy_name: policy.name.clone(),
                    severity: policy.severity,
                    violations: evaluation.details.clone(),
                });
            }
        }

        // Usage from the latest evaluation per policy only, so superseded
        // rows never double-count
        for evaluation in latest.values() {
            for detail in &evaluation.details {
                collect_llm_usage(detail, &mut usage_totals);
            }
        }

        let status = resolved_sessions.get(summary.id.as_str());
        let compliance_status = if status.is_some() {
            ComplianceStatus::Resolved
        } else if non_compliant_evaluations == 0 {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::Issues
        };

        session_rollups.push(SessionRollup {
            session_id: summary.id.clone(),
            is_compliant: non_compliant_evaluations == 0,
            compliance_status,
            is_fully_evaluated: fully_evaluated,
            needs_reprocessing: stale,
            evaluated_policy_count: evaluated_ids.len(),
            total_policy_count: enabled_ids.len(),
            resolved_at: status.and_then(|record| record.resolved_at),
            resolved_by: status.and_then(|record| record.resolved_by.clone()),
            total_evaluations,
            compliant_evaluations,
            non_compliant_evaluations,
            violation_count,
            policies_violated,
            policies_passed,
        });
    }

    let by_policy = enabled_policies
        .iter()
        .map(|policy| {
            let (compliant_count, total_count) =
                policy_counts.get(&policy.id).copied().unwrap_or((0, 0));
            PolicyRollup {
                policy_id: policy.id,
                name: policy.name.clone(),
                severity: policy.severity,
                compliant_count,
                total_count,
                compliance_rate: if total_count > 0 {
                    compliant_count as f64 / total_count as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    Ok(AgentSummary {
        agent_id: agent_id.to_string(),
        total_sessions: session_summaries.len(),
        processed_sessions,
        total_policies: enabled_policies.len(),
        by_policy,
        sessions: session_rollups,
        llm_usage_totals: usage_totals,
    })
}
