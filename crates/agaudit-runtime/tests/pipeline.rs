use agaudit_runtime::{
    JobController, SubmitRequest, agent_summary, evaluate_and_store, refresh_variants,
};
use agaudit_sessions::FsSessionStore;
use agaudit_testing::{ScriptedValidator, SessionWorld, fixtures};
use agaudit_types::{JobStatus, ProcessingJob, Severity};
use agaudit_validator::ValidatorFactory;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn seed_invoice_sessions(world: &SessionWorld) {
    world.write_messages(
        "billing",
        "s1",
        &serde_json::to_value(fixtures::invoice_messages(5000, true)).unwrap(),
    );
    world.write_messages(
        "billing",
        "s2",
        &serde_json::to_value(fixtures::invoice_messages(5000, false)).unwrap(),
    );
    world.write_messages(
        "billing",
        "s3",
        &serde_json::to_value(fixtures::invoice_messages(200, false)).unwrap(),
    );
}

fn seed_policies(world: &SessionWorld) -> (i64, i64) {
    let store = world.open_store();
    let handle = store.handle().unwrap();
    let approval = handle
        .insert_policy(
            "billing",
            "Invoice approval",
            "High value invoices need human approval",
            Severity::Error,
            true,
            &fixtures::approval_policy_config(),
        )
        .unwrap();
    let forbid = handle
        .insert_policy(
            "billing",
            "No customer deletion",
            "",
            Severity::Warning,
            true,
            &fixtures::forbid_tool_policy_config("delete_customer"),
        )
        .unwrap();
    (approval.id, forbid.id)
}

fn controller(world: &SessionWorld, validators: ValidatorFactory) -> JobController {
    controller_with_store(world.open_store(), world, validators)
}

fn controller_with_store(
    store: agaudit_store::Store,
    world: &SessionWorld,
    validators: ValidatorFactory,
) -> JobController {
    JobController::new(
        store,
        Arc::new(FsSessionStore::new(world.sessions_root())),
        Arc::new(validators),
    )
}

async fn wait_for_terminal(controller: &JobController, job_id: &str) -> ProcessingJob {
    for _ in 0..500 {
        let job = controller.job_status(job_id).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}

#[tokio::test]
async fn batch_job_processes_valid_sessions_and_drops_unknown_ids() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    seed_policies(&world);
    let controller = controller(&world, ValidatorFactory::new());

    let receipt = controller
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec![
                    "s1".to_string(),
                    "s2".to_string(),
                    "s3".to_string(),
                    "no-such-session".to_string(),
                ],
                policy_ids: None,
                refresh_variants: false,
            },
        )
        .unwrap();

    // The unknown id is rejected at submission time
    assert_eq!(receipt.total_items, 3);

    let job = wait_for_terminal(&controller, &receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_items, 3);
    assert_eq!(job.failed_items, 0);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(job.results.len(), 3);

    // 3 sessions x 2 enabled policies
    let store = world.open_store();
    let handle = store.handle().unwrap();
    let evaluations = handle.list_evaluations_for_agent("billing").unwrap();
    assert_eq!(evaluations.len(), 6);
}

#[tokio::test]
async fn empty_session_list_is_rejected() {
    let world = SessionWorld::new();
    seed_policies(&world);
    let controller = controller(&world, ValidatorFactory::new());

    let err = controller
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec!["ghost".to_string()],
                policy_ids: None,
                refresh_variants: false,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("No valid session IDs"));
}

#[tokio::test]
async fn submission_without_policies_is_rejected() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    let controller = controller(&world, ValidatorFactory::new());

    let err = controller
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec!["s1".to_string()],
                policy_ids: None,
                refresh_variants: false,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("No policies available"));
}

#[tokio::test]
async fn no_store_handle_is_open_during_llm_calls() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);

    let store = world.open_store();
    {
        let handle = store.handle().unwrap();
        handle
            .insert_policy(
                "billing",
                "Professional tone",
                "",
                Severity::Info,
                true,
                &serde_json::from_value(json!({
                    "checks": [
                        {"id": "tone", "type": "llm_response_validation",
                         "validation_prompt": "Response must be professional."}
                    ],
                    "violation_logic": {"type": "REQUIRE_ALL", "requirements": ["tone"]}
                }))
                .unwrap(),
            )
            .unwrap();
    }

    // Record the open-handle gauge at every validator call
    let observed_max = Arc::new(AtomicUsize::new(0));
    let gauge_store = store.clone();
    let observed = observed_max.clone();
    let validator = ScriptedValidator::approving().on_call(move || {
        observed.fetch_max(gauge_store.open_handles(), Ordering::SeqCst);
    });

    // The worker must share the instrumented store so the gauge sees its
    // handles; polling goes through a second store on the same path so the
    // test's own reads do not disturb the gauge.
    let worker = controller_with_store(
        store.clone(),
        &world,
        ValidatorFactory::new().with(Arc::new(validator)),
    );
    let receipt = worker
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec!["s1".to_string(), "s2".to_string()],
                policy_ids: None,
                refresh_variants: false,
            },
        )
        .unwrap();

    let poller = controller(&world, ValidatorFactory::new());
    let job = wait_for_terminal(&poller, &receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        observed_max.load(Ordering::SeqCst),
        0,
        "a store handle was open during an LLM call"
    );
}

#[tokio::test]
async fn job_with_refresh_builds_variants() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    seed_policies(&world);
    let controller = controller(&world, ValidatorFactory::new());

    let receipt = controller
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
                policy_ids: None,
                refresh_variants: true,
            },
        )
        .unwrap();

    let job = wait_for_terminal(&controller, &receipt.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error_message.is_none());

    let store = world.open_store();
    let handle = store.handle().unwrap();
    let variants = handle.list_variants("billing").unwrap();
    // s1 has the approval arm, s2 and s3 share the plain invoice shape
    assert_eq!(variants.len(), 2);
    let total_sessions: usize = variants
        .iter()
        .map(|variant| variant.session_ids.len())
        .sum();
    assert_eq!(total_sessions, 3);

    let aggregate = handle.list_transitions("billing", None).unwrap();
    assert!(!aggregate.is_empty());
    assert!(aggregate.iter().any(|t| t.from_tool == "_start"));
    assert!(aggregate.iter().any(|t| t.to_tool == "_end"));
}

#[tokio::test]
async fn variants_refresh_skips_unevaluated_sessions() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    seed_policies(&world);

    let store = world.open_store();
    let sessions = FsSessionStore::new(world.sessions_root());

    // Nothing evaluated yet: refresh is a no-op
    let summary = refresh_variants(&store, &sessions, "billing").unwrap();
    assert_eq!(summary.sessions_processed, 0);
    assert_eq!(summary.variants, 0);

    // Evaluate only s1, then refresh again
    evaluate_and_store(
        &store,
        &sessions,
        Arc::new(ValidatorFactory::new()),
        "billing",
        "s1",
        None,
    )
    .await
    .unwrap();

    let summary = refresh_variants(&store, &sessions, "billing").unwrap();
    assert_eq!(summary.sessions_processed, 1);
    assert_eq!(summary.variants, 1);
}

#[tokio::test]
async fn delete_job_refuses_nothing_after_completion_but_rejects_unknown() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    seed_policies(&world);
    let controller = controller(&world, ValidatorFactory::new());

    let receipt = controller
        .submit(
            "billing",
            SubmitRequest {
                session_ids: vec!["s1".to_string()],
                policy_ids: None,
                refresh_variants: false,
            },
        )
        .unwrap();
    wait_for_terminal(&controller, &receipt.job_id).await;

    controller.delete_job(&receipt.job_id).unwrap();
    assert!(controller.job_status(&receipt.job_id).is_err());
    assert!(controller.delete_job("no-such-job").is_err());
}

#[tokio::test]
async fn summary_tracks_staleness_and_resolution() {
    let world = SessionWorld::new();
    seed_invoice_sessions(&world);
    let (approval_id, _) = seed_policies(&world);

    let store = world.open_store();
    let sessions = FsSessionStore::new(world.sessions_root());
    let validators = Arc::new(ValidatorFactory::new());

    for session_id in ["s1", "s2", "s3"] {
        evaluate_and_store(&store, &sessions, validators.clone(), "billing", session_id, None)
            .await
            .unwrap();
    }

    let summary = agent_summary(&store, &sessions, "billing").unwrap();
    assert_eq!(summary.total_sessions, 3);
    assert_eq!(summary.processed_sessions, 3);
    assert_eq!(summary.total_policies, 2);

    // s1: approved high-value invoice passes both policies. s2: missing
    // approval violates the approval policy. s3: low-value, compliant.
    let s2 = summary
        .sessions
        .iter()
        .find(|session| session.session_id == "s2")
        .unwrap();
    assert!(!s2.is_compliant);
    assert_eq!(s2.compliance_status.as_str(), "issues");
    assert!(s2.violation_count >= 1);
    assert_eq!(s2.policies_violated[0].policy_name, "Invoice approval");

    let approval_rollup = summary
        .by_policy
        .iter()
        .find(|rollup| rollup.policy_id == approval_id)
        .unwrap();
    assert_eq!(approval_rollup.total_count, 3);
    assert_eq!(approval_rollup.compliant_count, 2);

    // Touching the policy after evaluation makes sessions stale
    {
        let handle = store.handle().unwrap();
        handle
            .update_policy_config("billing", approval_id, &fixtures::approval_policy_config())
            .unwrap();
    }
    let summary = agent_summary(&store, &sessions, "billing").unwrap();
    assert_eq!(summary.processed_sessions, 0);
    assert!(summary.sessions.iter().all(|session| session.needs_reprocessing));

    // Resolving a session overrides the derived status
    {
        let handle = store.handle().unwrap();
        handle
            .mark_resolved("billing", "s2", Some("casey"), Some("customer notified"))
            .unwrap();
    }
    let summary = agent_summary(&store, &sessions, "billing").unwrap();
    let s2 = summary
        .sessions
        .iter()
        .find(|session| session.session_id == "s2")
        .unwrap();
    assert_eq!(s2.compliance_status.as_str(), "resolved");
    assert_eq!(s2.resolved_by.as_deref(), Some("casey"));
}

#[tokio::test]
async fn llm_usage_rolls_up_from_latest_evaluations() {
    let world = SessionWorld::new();
    world.write_messages(
        "billing",
        "s1",
        &serde_json::to_value(fixtures::invoice_messages(5000, false)).unwrap(),
    );

    let store = world.open_store();
    {
        let handle = store.handle().unwrap();
        handle
            .insert_policy(
                "billing",
                "Professional tone",
                "",
                Severity::Info,
                true,
                &serde_json::from_value(json!({
                    "checks": [
                        {"id": "tone", "type": "llm_response_validation",
                         "validation_prompt": "Response must be professional."}
                    ],
                    "violation_logic": {"type": "REQUIRE_ALL", "requirements": ["tone"]}
                }))
                .unwrap(),
            )
            .unwrap();
    }

    let sessions = FsSessionStore::new(world.sessions_root());
    let validators =
        Arc::new(ValidatorFactory::new().with(Arc::new(ScriptedValidator::approving())));

    // Evaluate twice; only the latest evaluation may contribute usage
    for _ in 0..2 {
        evaluate_and_store(&store, &sessions, validators.clone(), "billing", "s1", None)
            .await
            .unwrap();
    }

    let summary = agent_summary(&store, &sessions, "billing").unwrap();
    assert_eq!(summary.llm_usage_totals.total_calls, 1);
    assert_eq!(summary.llm_usage_totals.input_tokens, 120);
    assert_eq!(summary.llm_usage_totals.output_tokens, 25);
    assert_eq!(summary.llm_usage_totals.total_tokens, 145);
    assert!(summary.llm_usage_totals.cost_usd > 0.0);
}
