use crate::evaluate::evaluate_session;
use crate::variants::refresh_variants;
use crate::{Error, Result};
use agaudit_engine::CompositeEvaluator;
use agaudit_sessions::SessionStore;
use agaudit_store::{JobUpdate, Store};
use agaudit_types::{JobStatus, Policy, ProcessingJob};
use agaudit_validator::ValidatorFactory;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Batch submission payload
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub session_ids: Vec<String>,
    /// Explicit policy set; None means all enabled policies for the agent
    pub policy_ids: Option<Vec<i64>>,
    pub refresh_variants: bool,
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: JobStatus,
    pub total_items: usize,
    pub message: String,
}

/// Drives async batch evaluations: validates submissions, persists the
/// pending job, runs it on a background task with short-lived store handles
/// around the slow LLM calls, and records progress as items complete.
#[derive(Clone)]
pub struct JobController {
    store: Store,
    sessions: Arc<dyn SessionStore>,
    validators: Arc<ValidatorFactory>,
}

impl JobController {
    pub fn new(
        store: Store,
        sessions: Arc<dyn SessionStore>,
        validators: Arc<ValidatorFactory>,
    ) -> Self {
        JobController {
            store,
            sessions,
            validators,
        }
    }

    /// Validate the submission, persist a pending job and start a
    /// background worker. Returns immediately with the job id.
    pub fn submit(&self, agent_id: &str, request: SubmitRequest) -> Result<SubmitReceipt> {
        // Unknown session ids are dropped here rather than failing the batch
        let mut valid_session_ids = Vec::new();
        for session_id in &request.session_ids {
            match self.sessions.load_session(agent_id, session_id) {
                Ok(Some(_)) => valid_session_ids.push(session_id.clone()),
                Ok(None) => {
                    tracing::warn!(agent_id, session_id, "dropping unknown session id");
                }
                Err(err) => {
                    tracing::warn!(agent_id, session_id, error = %err, "dropping unreadable session");
                }
            }
        }
        if valid_session_ids.is_empty() {
            return Err(Error::InvalidInput(
                "No valid session IDs provided".to_string(),
            ));
        }

        let policy_ids: Vec<i64> = {
            let handle = self.store.handle()?;
            let policies = match &request.policy_ids {
                Some(ids) => handle.list_policies_by_ids(agent_id, ids)?,
                None => handle.list_policies(agent_id, true)?,
            };
            policies.iter().map(|policy| policy.id).collect()
        };
        if policy_ids.is_empty() {
            return Err(Error::InvalidInput(
                "No policies available for evaluation".to_string(),
            ));
        }

        let job_id = Uuid::new_v4().to_string();
        let job = ProcessingJob {
            id: job_id.clone(),
            agent_id: agent_id.to_string(),
            status: JobStatus::Pending,
            job_type: ProcessingJob::TYPE_BATCH_EVALUATE.to_string(),
            total_items: valid_session_ids.len() as i64,
            completed_items: 0,
            failed_items: 0,
            input: json!({
                "session_ids": valid_session_ids.clone(),
                "policy_ids": policy_ids.clone(),
                "refresh_variants": request.refresh_variants,
            }),
            results: Vec::new(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.store.handle()?.insert_job(&job)?;

        let controller = self.clone();
        let agent = agent_id.to_string();
        let worker_job_id = job_id.clone();
        let session_count = valid_session_ids.len();
        let policy_count = policy_ids.len();
        tokio::spawn(async move {
            controller
                .run_job(
                    worker_job_id,
                    agent,
                    valid_session_ids,
                    policy_ids,
                    request.refresh_variants,
                )
                .await;
        });

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Pending,
            total_items: session_count,
            message: format!(
                "Job submitted. Processing {} sessions against {} policies.",
                session_count, policy_count
            ),
        })
    }

    pub fn job_status(&self, job_id: &str) -> Result<ProcessingJob> {
        self.store
            .handle()?
            .get_job(job_id)?
            .ok_or_else(|| Error::NotFound(format!("Job '{}'", job_id)))
    }

    pub fn list_jobs(
        &self,
        agent_id: Option<&str>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ProcessingJob>> {
        Ok(self.store.handle()?.list_jobs(agent_id, status, limit)?)
    }

    /// Delete a job record; a running job is refused
    pub fn delete_job(&self, job_id: &str) -> Result<()> {
        let handle = self.store.handle()?;
        let job = handle
            .get_job(job_id)?
            .ok_or_else(|| Error::NotFound(format!("Job '{}'", job_id)))?;
        if job.status == JobStatus::Running {
            return Err(Error::InvalidInput(
                "Cannot delete a running job".to_string(),
            ));
        }
        handle.delete_job(job_id)?;
        Ok(())
    }

    fn update_job(&self, job_id: &str, update: JobUpdate) {
        // Progress updates run on a dedicated short-lived handle; a failed
        // update must not abort the batch.
        match self.store.handle() {
            Ok(mut handle) => {
                if let Err(err) = handle.update_job(job_id, &update) {
                    tracing::warn!(job_id, error = %err, "failed to record job progress");
                }
            }
            Err(err) => {
                tracing::warn!(job_id, error = %err, "failed to open store for job progress");
            }
        }
    }

    async fn run_job(
        self,
        job_id: String,
        agent_id: String,
        session_ids: Vec<String>,
        policy_ids: Vec<i64>,
        refresh: bool,
    ) {
        if let Err(err) = self
            .run_job_inner(&job_id, &agent_id, &session_ids, &policy_ids, refresh)
            .await
        {
            tracing::error!(job_id, error = %err, "job failed");
            self.update_job(
                &job_id,
                JobUpdate {
                    status: Some(JobStatus::Failed),
                    error_message: Some(Some(err.to_string())),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            );
        }
    }

    async fn run_job_inner(
        &self,
        job_id: &str,
        agent_id: &str,
        session_ids: &[String],
        policy_ids: &[i64],
        refresh: bool,
    ) -> Result<()> {
        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Running),
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        );

        // Load the policy list once into plain values with a short-lived
        // handle. This is the only failure that fails the whole job.
        let policies: Vec<Policy> = {
            let handle = self.store.handle()?;
            handle.list_policies_by_ids(agent_id, policy_ids)?
        };

        let evaluator = CompositeEvaluator::new(self.validators.clone());
        let mut results: Vec<Value> = Vec::new();
        let mut failed_count: i64 = 0;

        for (idx, session_id) in session_ids.iter().enumerate() {
            match self
                .process_item(agent_id, session_id, &policies, &evaluator)
                .await
            {
                Ok(evaluation_count) => {
                    results.push(json!({
                        "session_id": session_id,
                        "status": "success",
                        "evaluations": evaluation_count,
                    }));
                }
                Err(Error::NotFound(_)) => {
                    failed_count += 1;
                    results.push(json!({
                        "session_id": session_id,
                        "status": "not_found",
                        "error": "Session not found",
                    }));
                }
                Err(err) => {
                    failed_count += 1;
                    results.push(json!({
                        "session_id": session_id,
                        "status": "error",
                        "error": err.to_string(),
                    }));
                }
            }

            self.update_job(
                job_id,
                JobUpdate {
                    completed_items: Some(idx as i64 + 1),
                    failed_items: Some(failed_count),
                    results: Some(results.clone()),
                    ..Default::default()
                },
            );
        }

        // Variants refresh failures are recorded but do not fail the job
        let mut error_message = None;
        if refresh {
            if let Err(err) = refresh_variants(&self.store, self.sessions.as_ref(), agent_id) {
                error_message = Some(format!("Variants refresh failed: {}", err));
            }
        }

        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Completed),
                completed_at: Some(Utc::now()),
                results: Some(results),
                error_message: Some(error_message),
                ..Default::default()
            },
        );
        Ok(())
    }

    /// One batch item: load the session (no store), evaluate in memory (the
    /// slow LLM calls happen here, with no handle open), then persist the
    /// replacement evaluations in one short transaction.
    async fn process_item(
        &self,
        agent_id: &str,
        session_id: &str,
        policies: &[Policy],
        evaluator: &CompositeEvaluator,
    ) -> Result<usize> {
        let session = self
            .sessions
            .load_session(agent_id, session_id)?
            .ok_or_else(|| Error::NotFound(format!("Session '{}'", session_id)))?;

        let evaluations = evaluate_session(evaluator, &session, policies).await;

        let mut handle = self.store.handle()?;
        handle.replace_evaluations(agent_id, &evaluations)?;
        Ok(evaluations.len())
    }
}
