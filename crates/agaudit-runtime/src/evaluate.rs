use crate::{Error, Result};
use agaudit_engine::CompositeEvaluator;
use agaudit_sessions::SessionStore;
use agaudit_store::Store;
use agaudit_types::{Evaluation, NewEvaluation, Policy, Session};
use agaudit_validator::ValidatorFactory;
use std::sync::Arc;

/// Evaluate one loaded session against a set of policies entirely in
/// memory. No store handle may be held by the caller: the evaluator
/// suspends on LLM calls.
pub(crate) async fn evaluate_session(
    evaluator: &CompositeEvaluator,
    session: &Session,
    policies: &[Policy],
) -> Vec<NewEvaluation> {
    let mut evaluations = Vec::with_capacity(policies.len());
    for policy in policies {
        let outcome = evaluator.evaluate_policy(session, policy).await;
        evaluations.push(NewEvaluation {
            session_id: session.id.clone(),
            policy_id: policy.id,
            is_compliant: outcome.is_compliant,
            details: outcome.details,
        });
    }
    evaluations
}

/// Synchronous evaluate-now path: load the session, run the evaluator in
/// memory, replace the current evaluations in one short store transaction
/// and return the stored rows.
pub async fn evaluate_and_store(
    store: &Store,
    sessions: &dyn SessionStore,
    validators: Arc<ValidatorFactory>,
    agent_id: &str,
    session_id: &str,
    policy_ids: Option<&[i64]>,
) -> Result<Vec<Evaluation>> {
    let session = sessions
        .load_session(agent_id, session_id)?
        .ok_or_else(|| Error::NotFound(format!("Session '{}'", session_id)))?;

    // Short-lived handle: read the policy list into plain values, then drop
    // it before any LLM call.
    let policies = {
        let handle = store.handle()?;
        match policy_ids {
            Some(ids) => handle.list_policies_by_ids(agent_id, ids)?,
            None => handle.list_policies(agent_id, true)?,
        }
    };
    if policies.is_empty() {
        return Err(Error::InvalidInput(
            "No policies available for evaluation".to_string(),
        ));
    }

    let evaluator = CompositeEvaluator::new(validators);
    let new_evaluations = evaluate_session(&evaluator, &session, &policies).await;

    let mut handle = store.handle()?;
    handle.replace_evaluations(agent_id, &new_evaluations)?;
    Ok(handle.list_evaluations(agent_id, session_id)?)
}
