use crate::checks::{Check, build_check};
use agaudit_types::{
    CheckResult, LogicKind, Message, Policy, PolicyConfig, Session, SessionMetadata,
    ViolationLogic,
};
use agaudit_validator::ValidatorFactory;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_CHECK_CONCURRENCY: usize = 10;

/// Verdict plus structured evidence for one `(session, policy)` pair
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub is_compliant: bool,
    /// Violation records when non-compliant, compliance details otherwise
    pub details: Vec<Value>,
}

/// Evaluates composite policies: fans the policy's checks out over a bounded
/// worker pool, then combines their outcomes under the policy's violation
/// logic. Each evaluation builds fresh check instances; the pool is private
/// to the evaluation.
pub struct CompositeEvaluator {
    validators: Arc<ValidatorFactory>,
    max_concurrent_checks: usize,
}

struct CheckIdent {
    id: String,
    name: String,
    check_type: String,
}

impl CompositeEvaluator {
    pub fn new(validators: Arc<ValidatorFactory>) -> Self {
        CompositeEvaluator {
            validators,
            max_concurrent_checks: DEFAULT_CHECK_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, max_concurrent_checks: usize) -> Self {
        self.max_concurrent_checks = max_concurrent_checks.max(1);
        self
    }

    pub async fn evaluate_policy(&self, session: &Session, policy: &Policy) -> PolicyOutcome {
        self.evaluate(
            &session.messages,
            &session.metadata,
            &policy.name,
            &policy.description,
            &policy.config,
        )
        .await
    }

    pub async fn evaluate(
        &self,
        messages: &[Message],
        metadata: &SessionMetadata,
        policy_name: &str,
        policy_description: &str,
        config: &PolicyConfig,
    ) -> PolicyOutcome {
        let mut checks = Vec::new();
        for spec in &config.checks {
            // Unknown check types are silently omitted: absent from the
            // result map, they can neither pass nor fail.
            if let Some(check) = build_check(spec, &self.validators) {
                checks.push((
                    CheckIdent {
                        id: spec.id.clone(),
                        name: spec.display_name(),
                        check_type: spec.check_type.clone(),
                    },
                    check,
                ));
            }
        }

        let check_results = self.run_checks(messages, metadata, checks).await;

        let (is_compliant, details) = apply_violation_logic(
            &check_results,
            &config.violation_logic,
            policy_name,
            policy_description,
        );

        PolicyOutcome {
            is_compliant,
            details,
        }
    }

    /// Run every check concurrently under the bounded pool and collect the
    /// results keyed by check id. A panicking check is reported as a
    /// synthetic failure rather than poisoning the evaluation.
    async fn run_checks(
        &self,
        messages: &[Message],
        metadata: &SessionMetadata,
        checks: Vec<(CheckIdent, Box<dyn Check>)>,
    ) -> HashMap<String, CheckResult> {
        let messages: Arc<Vec<Message>> = Arc::new(messages.to_vec());
        let metadata = Arc::new(metadata.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_checks));

        let mut tasks = Vec::new();
        for (ident, check) in checks {
            let messages = messages.clone();
            let metadata = metadata.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("check pool semaphore is never closed");
                check.evaluate(&messages, &metadata).await
            });
            tasks.push((ident, handle));
        }

        let mut results = HashMap::new();
        for (ident, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(check_id = %ident.id, error = %err, "check task failed");
                    CheckResult {
                        check_id: ident.id.clone(),
                        check_name: ident.name,
                        check_type: ident.check_type,
                        passed: false,
                        message: format!("Check execution failed: {}", err),
                        details: Value::Null,
                        matched_items: Vec::new(),
                        llm_usage: None,
                    }
                }
            };
            results.insert(ident.id, result);
        }
        results
    }
}

fn apply_violation_logic(
    check_results: &HashMap<String, CheckResult>,
    logic: &ViolationLogic,
    policy_name: &str,
    policy_description: &str,
) -> (bool, Vec<Value>) {
    match logic.kind {
        LogicKind::IfAnyThenAll => {
            evaluate_if_then_all(check_results, logic, policy_name, policy_description, false)
        }
        LogicKind::IfAllThenAll => {
            evaluate_if_then_all(check_results, logic, policy_name, policy_description, true)
        }
        LogicKind::RequireAll => {
            evaluate_require_all(check_results, logic, policy_name, policy_description)
        }
        LogicKind::RequireAny => {
            evaluate_require_any(check_results, logic, policy_name, policy_description)
        }
        LogicKind::ForbidAll => {
            evaluate_forbid_all(check_results, logic, policy_name, policy_description)
        }
    }
}

fn to_values(results: &[CheckResult]) -> Vec<Value> {
    results.iter().map(CheckResult::to_value).collect()
}

/// Split requirement ids into passed and failed results. An id that
/// resolved to no result counts as failed with a "check not found" record.
fn split_requirements(
    requirement_ids: &[String],
    check_results: &HashMap<String, CheckResult>,
) -> (Vec<CheckResult>, Vec<CheckResult>) {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for requirement_id in requirement_ids {
        match check_results.get(requirement_id) {
            Some(result) if result.passed => passed.push(result.clone()),
            Some(result) => failed.push(result.clone()),
            None => failed.push(CheckResult::not_found(requirement_id)),
        }
    }
    (passed, failed)
}

/// A trigger id with no result counts as not-fired
fn split_triggers(
    trigger_ids: &[String],
    check_results: &HashMap<String, CheckResult>,
) -> (Vec<CheckResult>, Vec<CheckResult>) {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for trigger_id in trigger_ids {
        if let Some(result) = check_results.get(trigger_id) {
            if result.passed {
                passed.push(result.clone());
            } else {
                failed.push(result.clone());
            }
        }
    }
    (passed, failed)
}

fn check_names(results: &[CheckResult]) -> Vec<&str> {
    results.iter().map(|result| result.check_name.as_str()).collect()
}

fn evaluate_if_then_all(
    check_results: &HashMap<String, CheckResult>,
    logic: &ViolationLogic,
    policy_name: &str,
    policy_description: &str,
    require_all_triggers: bool,
) -> (bool, Vec<Value>) {
    let violation_type = if require_all_triggers {
        "IF_ALL_THEN_ALL"
    } else {
        "IF_ANY_THEN_ALL"
    };
    let (triggers_passed, triggers_failed) = split_triggers(&logic.triggers, check_results);

    let antecedent_fired = if require_all_triggers {
        triggers_passed.len() == logic.triggers.len()
    } else {
        !triggers_passed.is_empty()
    };

    if !antecedent_fired {
        // Compliant by gating; requirements stay unevaluated but are shown
        // for context.
        let unevaluated: Vec<CheckResult> = logic
            .requirements
            .iter()
            .filter_map(|requirement_id| check_results.get(requirement_id).cloned())
            .collect();

        let (summary, violation_message) = if require_all_triggers {
            (
                "Not all trigger conditions triggered",
                format!(
                    "{} of {} triggers triggered, policy requirements not evaluated",
                    triggers_passed.len(),
                    logic.triggers.len()
                ),
            )
        } else {
            (
                "Trigger condition not triggered",
                format!(
                    "None of {} trigger(s) triggered, policy requirements not evaluated",
                    logic.triggers.len()
                ),
            )
        };

        let details = json!({
            "policy_name": policy_name,
            "policy_description": policy_description,
            "violation_type": violation_type,
            "triggered_checks": to_values(&triggers_passed),
            "failed_triggers": to_values(&triggers_failed),
            "unevaluated_requirements": to_values(&unevaluated),
            "failed_requirements": [],
            "passed_requirements": [],
            "summary": summary,
            "violation_message": violation_message,
        });
        return (true, vec![details]);
    }

    let (passed_requirements, failed_requirements) =
        split_requirements(&logic.requirements, check_results);
    let is_compliant = failed_requirements.is_empty();

    if is_compliant {
        let (summary, violation_message) = if require_all_triggers {
            (
                "All requirements met when all trigger conditions triggered",
                format!(
                    "All {} triggers triggered and all {} required checks passed",
                    triggers_passed.len(),
                    passed_requirements.len()
                ),
            )
        } else {
            (
                "All requirements met when trigger condition triggered",
                format!(
                    "Trigger '{}' triggered and all {} required checks passed",
                    triggers_passed[0].check_name,
                    passed_requirements.len()
                ),
            )
        };

        let details = json!({
            "policy_name": policy_name,
            "policy_description": policy_description,
            "violation_type": violation_type,
            "triggered_checks": to_values(&triggers_passed),
            "failed_triggers": to_values(&triggers_failed),
            "failed_requirements": [],
            "passed_requirements": to_values(&passed_requirements),
            "summary": summary,
            "violation_message": violation_message,
        });
        return (true, vec![details]);
    }

    let (summary, violation_message) = if require_all_triggers {
        (
            "All trigger conditions met but required checks failed",
            if_all_violation_message(&triggers_passed, &failed_requirements),
        )
    } else {
        (
            "Trigger condition met but required checks failed",
            if_any_violation_message(&triggers_passed, &failed_requirements),
        )
    };

    let violation = json!({
        "policy_name": policy_name,
        "policy_description": policy_description,
        "violation_type": violation_type,
        "triggered_checks": to_values(&triggers_passed),
        "failed_triggers": to_values(&triggers_failed),
        "failed_requirements": to_values(&failed_requirements),
        "passed_requirements": to_values(&passed_requirements),
        "summary": summary,
        "violation_message": violation_message,
    });

    (
        false,
        per_message_violations(violation, &failed_requirements, &triggers_passed),
    )
}

fn evaluate_require_all(
    check_results: &HashMap<String, CheckResult>,
    logic: &ViolationLogic,
    policy_name: &str,
    policy_description: &str,
) -> (bool, Vec<Value>) {
    let (passed_checks, failed_checks) = split_requirements(&logic.requirements, check_results);
    let is_compliant = failed_checks.is_empty();

    let description = non_empty_or(policy_description, "All specified checks must pass");
    let mut details = json!({
        "policy_name": policy_name,
        "policy_description": description,
        "violation_type": "REQUIRE_ALL",
        "failed_requirements": to_values(&failed_checks),
        "passed_requirements": to_values(&passed_checks),
    });
    let object = details.as_object_mut().expect("details is an object");

    if is_compliant {
        object.insert("summary".into(), json!("All required checks passed"));
        object.insert(
            "violation_message".into(),
            json!(format!(
                "All {} required checks passed successfully",
                passed_checks.len()
            )),
        );
        return (true, vec![details]);
    }

    object.insert("summary".into(), json!("One or more required checks failed"));
    object.insert(
        "violation_message".into(),
        json!(require_all_violation_message(&failed_checks)),
    );
    (false, vec![details])
}

fn evaluate_require_any(
    check_results: &HashMap<String, CheckResult>,
    logic: &ViolationLogic,
    policy_name: &str,
    policy_description: &str,
) -> (bool, Vec<Value>) {
    let (passed_checks, failed_checks) = split_requirements(&logic.requirements, check_results);
    let is_compliant = !passed_checks.is_empty();

    let description = non_empty_or(policy_description, "At least one check must pass");
    let mut details = json!({
        "policy_name": policy_name,
        "policy_description": description,
        "violation_type": "REQUIRE_ANY",
        "failed_requirements": to_values(&failed_checks),
        "passed_requirements": to_values(&passed_checks),
    });
    let object = details.as_object_mut().expect("details is an object");

    if is_compliant {
        object.insert(
            "summary".into(),
            json!("At least one alternative check passed"),
        );
        object.insert(
            "violation_message".into(),
            json!(format!(
                "{} of {} alternative check(s) passed",
                passed_checks.len(),
                logic.requirements.len()
            )),
        );
        return (true, vec![details]);
    }

    object.insert(
        "summary".into(),
        json!("None of the alternative checks passed"),
    );
    object.insert(
        "violation_message".into(),
        json!(format!(
            "At least one check must pass, but all {} checks failed: {}",
            failed_checks.len(),
            check_names(&failed_checks).join(", ")
        )),
    );
    (false, vec![details])
}

fn evaluate_forbid_all(
    check_results: &HashMap<String, CheckResult>,
    logic: &ViolationLogic,
    policy_name: &str,
    policy_description: &str,
) -> (bool, Vec<Value>) {
    let (forbidden_passed, forbidden_avoided) = split_triggers(&logic.forbidden, check_results);

    if forbidden_passed.is_empty() {
        let details = json!({
            "policy_name": policy_name,
            "policy_description": non_empty_or(policy_description, "No forbidden actions should occur"),
            "violation_type": "FORBID_ALL",
            "summary": "No forbidden actions detected",
            "forbidden_checks_avoided": to_values(&forbidden_avoided),
            "violation_message": format!(
                "All {} forbidden action(s) were successfully avoided",
                logic.forbidden.len()
            ),
        });
        return (true, vec![details]);
    }

    if !logic.requirements.is_empty() {
        // Exception path: forbidden behavior is excused when every
        // requirement passes.
        let (passed_requirements, failed_requirements) =
            split_requirements(&logic.requirements, check_results);

        if failed_requirements.is_empty() {
            let details = json!({
                "policy_name": policy_name,
                "policy_description": non_empty_or(
                    policy_description,
                    "Forbidden actions allowed with proper authorization"
                ),
                "violation_type": "FORBID_ALL",
                "summary": "Forbidden actions detected but properly authorized",
                "forbidden_checks": to_values(&forbidden_passed),
                "passed_requirements": to_values(&passed_requirements),
                "violation_message": format!(
                    "{} forbidden action(s) detected but authorized by {} requirement(s)",
                    forbidden_passed.len(),
                    passed_requirements.len()
                ),
            });
            return (true, vec![details]);
        }

        let violation = json!({
            "policy_name": policy_name,
            "policy_description": policy_description,
            "violation_type": "FORBID_ALL",
            "summary": "Forbidden actions detected without required authorization",
            "forbidden_checks": to_values(&forbidden_passed),
            "failed_requirements": to_values(&failed_requirements),
            "violation_message": forbid_all_violation_message(&forbidden_passed, &failed_requirements),
        });
        return (false, vec![violation]);
    }

    let violation = json!({
        "policy_name": policy_name,
        "policy_description": policy_description,
        "violation_type": "FORBID_ALL",
        "summary": "Forbidden actions detected",
        "forbidden_checks": to_values(&forbidden_passed),
        "violation_message": forbid_all_strict_message(&forbidden_passed),
    });
    (false, vec![violation])
}

fn non_empty_or<'a>(description: &'a str, default: &'a str) -> &'a str {
    if description.is_empty() {
        default
    } else {
        description
    }
}

// --- Violation message generators ---

fn if_any_violation_message(triggers: &[CheckResult], failed: &[CheckResult]) -> String {
    let trigger_names = check_names(triggers);
    let trigger_text = if trigger_names.len() == 1 {
        format!("'{}'", trigger_names[0])
    } else {
        format!("one of [{}]", trigger_names.join(", "))
    };

    if failed.len() == 1 {
        format!(
            "Trigger {} activated, but required check '{}' failed",
            trigger_text, failed[0].check_name
        )
    } else {
        format!(
            "Trigger {} activated, but {} required checks failed: {}",
            trigger_text,
            failed.len(),
            check_names(failed).join(", ")
        )
    }
}

fn if_all_violation_message(triggers: &[CheckResult], failed: &[CheckResult]) -> String {
    let trigger_names = check_names(triggers).join(", ");
    if failed.len() == 1 {
        format!(
            "All triggers activated [{}], but required check '{}' failed",
            trigger_names, failed[0].check_name
        )
    } else {
        format!(
            "All triggers activated [{}], but {} required checks failed: {}",
            trigger_names,
            failed.len(),
            check_names(failed).join(", ")
        )
    }
}

fn require_all_violation_message(failed: &[CheckResult]) -> String {
    if failed.len() == 1 {
        format!("Required check '{}' failed", failed[0].check_name)
    } else {
        format!(
            "{} required checks failed: {}",
            failed.len(),
            check_names(failed).join(", ")
        )
    }
}

fn forbid_all_violation_message(
    forbidden: &[CheckResult],
    failed_requirements: &[CheckResult],
) -> String {
    let forbidden_text = if forbidden.len() == 1 {
        format!("Forbidden action '{}' detected", forbidden[0].check_name)
    } else {
        format!(
            "Forbidden actions detected: {}",
            check_names(forbidden).join(", ")
        )
    };

    if failed_requirements.is_empty() {
        format!("{} without required authorization", forbidden_text)
    } else {
        format!(
            "{}, but authorization checks failed: {}",
            forbidden_text,
            check_names(failed_requirements).join(", ")
        )
    }
}

fn forbid_all_strict_message(forbidden: &[CheckResult]) -> String {
    if forbidden.len() == 1 {
        format!("Forbidden action '{}' was performed", forbidden[0].check_name)
    } else {
        format!(
            "Forbidden actions performed: {}",
            check_names(forbidden).join(", ")
        )
    }
}

/// Fan one logical violation into per-message records: one clone per
/// distinct message index referenced by the failed requirements' matched
/// items. When the failed requirements reference no messages (a
/// required-but-absent tool call matches nothing), the fired triggers'
/// matched items anchor the violation instead; with no index recoverable at
/// all, the single base record is emitted.
fn per_message_violations(
    base: Value,
    failed_requirements: &[CheckResult],
    triggers_passed: &[CheckResult],
) -> Vec<Value> {
    let mut indices: BTreeSet<u64> = BTreeSet::new();
    for requirement in failed_requirements {
        indices.extend(requirement.message_indices());
    }
    if indices.is_empty() {
        for trigger in triggers_passed {
            indices.extend(trigger.message_indices());
        }
    }

    if indices.is_empty() {
        return vec![base];
    }

    indices
        .into_iter()
        .map(|index| {
            let mut clone = base.clone();
            clone
                .as_object_mut()
                .expect("violation record is an object")
                .insert("message_index".into(), json!(index));
            clone
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn result(id: &str, passed: bool, indices: &[u64]) -> CheckResult {
        CheckResult {
            check_id: id.to_string(),
            check_name: format!("Check {}", id),
            check_type: "tool_call".to_string(),
            passed,
            message: String::new(),
            details: Value::Null,
            matched_items: indices
                .iter()
                .map(|index| json!({"message_index": index}))
                .collect(),
            llm_usage: None,
        }
    }

    fn results(entries: Vec<CheckResult>) -> HashMap<String, CheckResult> {
        entries
            .into_iter()
            .map(|entry| (entry.check_id.clone(), entry))
            .collect()
    }

    fn logic(kind: LogicKind, triggers: &[&str], requirements: &[&str]) -> ViolationLogic {
        ViolationLogic {
            kind,
            triggers: triggers.iter().map(|id| id.to_string()).collect(),
            requirements: requirements.iter().map(|id| id.to_string()).collect(),
            forbidden: Vec::new(),
        }
    }

    #[test]
    fn trigger_gating_makes_policy_compliant() {
        let check_results = results(vec![result("t1", false, &[]), result("r1", false, &[])]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["t1"], &["r1"]),
            "p",
            "",
        );

        assert!(compliant);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0]["summary"], "Trigger condition not triggered");
    }

    #[test]
    fn if_any_then_all_satisfied_reports_single_detail() {
        let check_results = results(vec![result("t1", true, &[1]), result("r1", true, &[2])]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["t1"], &["r1"]),
            "p",
            "",
        );

        assert!(compliant);
        assert_eq!(
            details[0]["summary"],
            "All requirements met when trigger condition triggered"
        );
    }

    #[test]
    fn if_any_then_all_violation_fans_out_per_message() {
        let check_results = results(vec![
            result("t1", true, &[1]),
            result("r1", false, &[1, 3]),
        ]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["t1"], &["r1"]),
            "p",
            "",
        );

        assert!(!compliant);
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["message_index"], 1);
        assert_eq!(details[1]["message_index"], 3);
        assert_eq!(
            details[0]["summary"],
            "Trigger condition met but required checks failed"
        );
    }

    #[test]
    fn violation_without_indices_stays_single() {
        let check_results = results(vec![result("t1", true, &[]), result("r1", false, &[])]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["t1"], &["r1"]),
            "p",
            "",
        );

        assert!(!compliant);
        assert_eq!(details.len(), 1);
        assert!(details[0].get("message_index").is_none());
    }

    #[test]
    fn if_all_then_all_requires_every_trigger() {
        let check_results = results(vec![
            result("t1", true, &[]),
            result("t2", false, &[]),
            result("r1", false, &[]),
        ]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAllThenAll, &["t1", "t2"], &["r1"]),
            "p",
            "",
        );

        assert!(compliant);
        assert_eq!(details[0]["summary"], "Not all trigger conditions triggered");
        assert_eq!(
            details[0]["violation_message"],
            "1 of 2 triggers triggered, policy requirements not evaluated"
        );
    }

    #[test]
    fn missing_requirement_counts_as_failed() {
        let check_results = results(vec![result("t1", true, &[])]);
        let (compliant, details) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["t1"], &["ghost"]),
            "p",
            "",
        );

        assert!(!compliant);
        let failed = details[0]["failed_requirements"].as_array().unwrap();
        assert_eq!(failed[0]["message"], "Check 'ghost' not found");
    }

    #[test]
    fn missing_trigger_counts_as_not_fired() {
        let check_results = results(vec![result("r1", false, &[])]);
        let (compliant, _) = apply_violation_logic(
            &check_results,
            &logic(LogicKind::IfAnyThenAll, &["ghost"], &["r1"]),
            "p",
            "",
        );
        assert!(compliant);
    }

    #[test]
    fn require_all_is_at_least_as_strict_as_require_any() {
        // Logic monotonicity: every outcome set passing REQUIRE_ALL passes
        // REQUIRE_ANY over the same ids.
        let outcome_sets = [
            vec![true, true],
            vec![true, false],
            vec![false, false],
            vec![true],
            vec![false],
        ];

        for outcomes in outcome_sets {
            let entries: Vec<CheckResult> = outcomes
                .iter()
                .enumerate()
                .map(|(index, passed)| result(&format!("c{}", index), *passed, &[]))
                .collect();
            let ids: Vec<String> = entries.iter().map(|entry| entry.check_id.clone()).collect();
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let check_results = results(entries);

            let (all_ok, _) = apply_violation_logic(
                &check_results,
                &logic(LogicKind::RequireAll, &[], &id_refs),
                "p",
                "",
            );
            let (any_ok, _) = apply_violation_logic(
                &check_results,
                &logic(LogicKind::RequireAny, &[], &id_refs),
                "p",
                "",
            );

            if all_ok {
                assert!(any_ok, "REQUIRE_ALL passed but REQUIRE_ANY failed");
            }
        }
    }

    #[test]
    fn forbid_all_escape_when_requirements_met() {
        let mut violation_logic = logic(LogicKind::ForbidAll, &[], &["auth"]);
        violation_logic.forbidden = vec!["f1".to_string()];

        let check_results = results(vec![result("f1", true, &[]), result("auth", true, &[])]);
        let (compliant, details) =
            apply_violation_logic(&check_results, &violation_logic, "p", "");

        assert!(compliant);
        assert_eq!(
            details[0]["summary"],
            "Forbidden actions detected but properly authorized"
        );
    }

    #[test]
    fn forbid_all_without_exception_is_violation() {
        let mut violation_logic = logic(LogicKind::ForbidAll, &[], &[]);
        violation_logic.forbidden = vec!["f1".to_string()];

        let check_results = results(vec![result("f1", true, &[])]);
        let (compliant, details) =
            apply_violation_logic(&check_results, &violation_logic, "p", "");

        assert!(!compliant);
        assert_eq!(
            details[0]["violation_message"],
            "Forbidden action 'Check f1' was performed"
        );
    }

    struct PanickyCheck;

    #[async_trait]
    impl Check for PanickyCheck {
        async fn evaluate(
            &self,
            _messages: &[Message],
            _metadata: &SessionMetadata,
        ) -> CheckResult {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn panicking_check_becomes_synthetic_failure() {
        let evaluator = CompositeEvaluator::new(Arc::new(ValidatorFactory::new()));
        let checks: Vec<(CheckIdent, Box<dyn Check>)> = vec![(
            CheckIdent {
                id: "c1".to_string(),
                name: "Panicky".to_string(),
                check_type: "tool_call".to_string(),
            },
            Box::new(PanickyCheck),
        )];

        let results = evaluator
            .run_checks(&[], &SessionMetadata::default(), checks)
            .await;

        let result = results.get("c1").expect("synthetic result present");
        assert!(!result.passed);
        assert!(result.message.starts_with("Check execution failed"));
    }
}
