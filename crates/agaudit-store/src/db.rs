use crate::records::{JobUpdate, VariantSeed};
use crate::schema::SCHEMA;
use agaudit_types::{
    AgentVariant, ComplianceStatus, Evaluation, JobStatus, NewEvaluation, Policy, PolicyConfig,
    ProcessingJob, SessionStatusRecord, Severity, ToolTransition,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Handle factory for the metadata store. Cloning is cheap; every unit of
/// work acquires its own short-lived [`StoreHandle`] and drops it before any
/// suspension point. The open-handle gauge exists so tests can assert that
/// no handle is alive during an LLM call.
#[derive(Clone)]
pub struct Store {
    path: PathBuf,
    open_handles: Arc<AtomicUsize>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory for {}", path.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open store: {}", path.display()))?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        Ok(Self {
            path,
            open_handles: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a scoped connection. Must be dropped before any await point
    /// that can suspend on external work.
    pub fn handle(&self) -> Result<StoreHandle> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to open store: {}", self.path.display()))?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(StoreHandle {
            conn,
            gauge: self.open_handles.clone(),
        })
    }

    /// Number of live handles, for diagnostics and tests
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

pub struct StoreHandle {
    conn: Connection,
    gauge: Arc<AtomicUsize>,
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp: {}", raw))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(&s)).transpose()
}

fn severity_from_str(raw: &str) -> Severity {
    match raw {
        "warning" => Severity::Warning,
        "info" => Severity::Info,
        _ => Severity::Error,
    }
}

fn job_status_from_str(raw: &str) -> JobStatus {
    match raw {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

fn compliance_status_from_str(raw: &str) -> Option<ComplianceStatus> {
    match raw {
        "compliant" => Some(ComplianceStatus::Compliant),
        "issues" => Some(ComplianceStatus::Issues),
        "resolved" => Some(ComplianceStatus::Resolved),
        _ => None,
    }
}

impl StoreHandle {
    // --- Policies ---

    pub fn insert_policy(
        &self,
        agent_id: &str,
        name: &str,
        description: &str,
        severity: Severity,
        enabled: bool,
        config: &PolicyConfig,
    ) -> Result<Policy> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO policies (agent_id, name, description, severity, enabled, config, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                agent_id,
                name,
                description,
                severity.as_str(),
                enabled,
                serde_json::to_string(config)?,
                now.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        Ok(Policy {
            id,
            agent_id: agent_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            severity,
            enabled,
            config: config.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    fn policy_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Policy, String, String, String)> {
        Ok((
            Policy {
                id: row.get(0)?,
                agent_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                severity: Severity::Error,
                enabled: row.get(5)?,
                config: PolicyConfig::default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            row.get::<_, String>(4)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    }

    fn finish_policy(parts: (Policy, String, String, String), config_raw: String) -> Result<Policy> {
        let (mut policy, severity_raw, created_raw, updated_raw) = parts;
        policy.severity = severity_from_str(&severity_raw);
        policy.config = serde_json::from_str(&config_raw)
            .with_context(|| format!("Corrupt policy config for policy {}", policy.id))?;
        policy.created_at = parse_ts(&created_raw)?;
        policy.updated_at = parse_ts(&updated_raw)?;
        Ok(policy)
    }

    fn query_policies(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Policy>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| {
                let parts = Self::policy_from_row(row)?;
                let config_raw: String = row.get(8)?;
                Ok((parts, config_raw))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(parts, config_raw)| Self::finish_policy(parts, config_raw))
            .collect()
    }

    pub fn get_policy(&self, agent_id: &str, policy_id: i64) -> Result<Option<Policy>> {
        let mut policies = self.query_policies(
            r#"
            SELECT id, agent_id, name, description, severity, enabled, created_at, updated_at, config
            FROM policies
            WHERE agent_id = ?1 AND id = ?2
            "#,
            &[&agent_id, &policy_id],
        )?;
        Ok(policies.pop())
    }

    pub fn list_policies(&self, agent_id: &str, enabled_only: bool) -> Result<Vec<Policy>> {
        if enabled_only {
            self.query_policies(
                r#"
                SELECT id, agent_id, name, description, severity, enabled, created_at, updated_at, config
                FROM policies
                WHERE agent_id = ?1 AND enabled = 1
                ORDER BY id
                "#,
                &[&agent_id],
            )
        } else {
            self.query_policies(
                r#"
                SELECT id, agent_id, name, description, severity, enabled, created_at, updated_at, config
                FROM policies
                WHERE agent_id = ?1
                ORDER BY id
                "#,
                &[&agent_id],
            )
        }
    }

    pub fn list_policies_by_ids(&self, agent_id: &str, ids: &[i64]) -> Result<Vec<Policy>> {
        let mut policies = Vec::new();
        for id in ids {
            if let Some(policy) = self.get_policy(agent_id, *id)? {
                policies.push(policy);
            }
        }
        Ok(policies)
    }

    pub fn set_policy_enabled(&self, agent_id: &str, policy_id: i64, enabled: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE policies SET enabled = ?3, updated_at = ?4 WHERE agent_id = ?1 AND id = ?2",
            params![agent_id, policy_id, enabled, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    pub fn update_policy_config(
        &self,
        agent_id: &str,
        policy_id: i64,
        config: &PolicyConfig,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE policies SET config = ?3, updated_at = ?4 WHERE agent_id = ?1 AND id = ?2",
            params![
                agent_id,
                policy_id,
                serde_json::to_string(config)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_policy(&mut self, agent_id: &str, policy_id: i64) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM evaluations WHERE agent_id = ?1 AND policy_id = ?2",
            params![agent_id, policy_id],
        )?;
        let changed = tx.execute(
            "DELETE FROM policies WHERE agent_id = ?1 AND id = ?2",
            params![agent_id, policy_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    // --- Evaluations ---

    /// Replace the current evaluations for each `(session, policy)` pair in
    /// one transaction, so consumers always observe exactly one current row.
    pub fn replace_evaluations(
        &mut self,
        agent_id: &str,
        evaluations: &[NewEvaluation],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for evaluation in evaluations {
            tx.execute(
                "DELETE FROM evaluations WHERE agent_id = ?1 AND session_id = ?2 AND policy_id = ?3",
                params![agent_id, evaluation.session_id, evaluation.policy_id],
            )?;
            tx.execute(
                r#"
                INSERT INTO evaluations (agent_id, session_id, policy_id, is_compliant, details, evaluated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    agent_id,
                    evaluation.session_id,
                    evaluation.policy_id,
                    evaluation.is_compliant,
                    serde_json::to_string(&evaluation.details)?,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_evaluations(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Evaluation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, agent_id, session_id, policy_id, is_compliant, details_raw, ts_raw)| {
                Ok(Evaluation {
                    id,
                    agent_id,
                    session_id,
                    policy_id,
                    is_compliant,
                    details: serde_json::from_str(&details_raw)
                        .with_context(|| format!("Corrupt evaluation details for row {}", id))?,
                    evaluated_at: parse_ts(&ts_raw)?,
                })
            })
            .collect()
    }

    pub fn list_evaluations(&self, agent_id: &str, session_id: &str) -> Result<Vec<Evaluation>> {
        self.query_evaluations(
            r#"
            SELECT id, agent_id, session_id, policy_id, is_compliant, details, evaluated_at
            FROM evaluations
            WHERE agent_id = ?1 AND session_id = ?2
            ORDER BY id
            "#,
            &[&agent_id, &session_id],
        )
    }

    pub fn list_evaluations_for_agent(&self, agent_id: &str) -> Result<Vec<Evaluation>> {
        self.query_evaluations(
            r#"
            SELECT id, agent_id, session_id, policy_id, is_compliant, details, evaluated_at
            FROM evaluations
            WHERE agent_id = ?1
            ORDER BY id
            "#,
            &[&agent_id],
        )
    }

    pub fn count_evaluations(&self, agent_id: &str, session_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM evaluations WHERE agent_id = ?1 AND session_id = ?2",
            params![agent_id, session_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // --- Variants & transitions ---

    /// Clear and rebuild the variant and transition rows for an agent inside
    /// a single transaction; a failure rolls the whole refresh back.
    pub fn replace_variants(
        &mut self,
        agent_id: &str,
        seeds: &[VariantSeed],
        aggregate: &[crate::TransitionSeed],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM tool_transitions WHERE agent_id = ?1",
            params![agent_id],
        )?;
        tx.execute(
            "DELETE FROM agent_variants WHERE agent_id = ?1",
            params![agent_id],
        )?;

        for seed in seeds {
            tx.execute(
                r#"
                INSERT INTO agent_variants
                    (agent_id, signature, name, normalized_sequence, sequence_display, session_ids, tool_count, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    agent_id,
                    seed.signature,
                    seed.name,
                    serde_json::to_string(&seed.normalized_sequence)?,
                    seed.sequence_display,
                    serde_json::to_string(&seed.session_ids)?,
                    seed.tool_count as i64,
                    now,
                ],
            )?;
            let variant_id = tx.last_insert_rowid();

            for transition in &seed.transitions {
                tx.execute(
                    r#"
                    INSERT INTO tool_transitions (agent_id, from_tool, to_tool, count, variant_id)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        agent_id,
                        transition.from_tool,
                        transition.to_tool,
                        transition.count,
                        variant_id
                    ],
                )?;
            }
        }

        for transition in aggregate {
            tx.execute(
                r#"
                INSERT INTO tool_transitions (agent_id, from_tool, to_tool, count, variant_id)
                VALUES (?1, ?2, ?3, ?4, NULL)
                "#,
                params![
                    agent_id,
                    transition.from_tool,
                    transition.to_tool,
                    transition.count
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn list_variants(&self, agent_id: &str) -> Result<Vec<AgentVariant>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, agent_id, signature, name, normalized_sequence, sequence_display, session_ids, tool_count, created_at
            FROM agent_variants
            WHERE agent_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map([agent_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, agent_id, signature, name, seq_raw, display, sessions_raw, tool_count, ts)| {
                    Ok(AgentVariant {
                        id,
                        agent_id,
                        signature,
                        name,
                        normalized_sequence: serde_json::from_str(&seq_raw)?,
                        sequence_display: display,
                        session_ids: serde_json::from_str(&sessions_raw)?,
                        tool_count: tool_count as usize,
                        created_at: parse_ts(&ts)?,
                    })
                },
            )
            .collect()
    }

    /// Transitions for an agent. `variant_id = None` returns the agent-wide
    /// aggregate rows.
    pub fn list_transitions(
        &self,
        agent_id: &str,
        variant_id: Option<i64>,
    ) -> Result<Vec<ToolTransition>> {
        let (sql, args): (&str, Vec<&dyn rusqlite::ToSql>) = match &variant_id {
            Some(id) => (
                r#"
                SELECT id, agent_id, from_tool, to_tool, count, variant_id
                FROM tool_transitions
                WHERE agent_id = ?1 AND variant_id = ?2
                ORDER BY count DESC, from_tool, to_tool
                "#,
                vec![&agent_id, id],
            ),
            None => (
                r#"
                SELECT id, agent_id, from_tool, to_tool, count, variant_id
                FROM tool_transitions
                WHERE agent_id = ?1 AND variant_id IS NULL
                ORDER BY count DESC, from_tool, to_tool
                "#,
                vec![&agent_id],
            ),
        };

        let mut stmt = self.conn.prepare(sql)?;
        let transitions = stmt
            .query_map(args.as_slice(), |row| {
                Ok(ToolTransition {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    from_tool: row.get(2)?,
                    to_tool: row.get(3)?,
                    count: row.get(4)?,
                    variant_id: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transitions)
    }

    // --- Session status ---

    pub fn mark_resolved(
        &self,
        agent_id: &str,
        session_id: &str,
        resolved_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<SessionStatusRecord> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO session_status
                (session_id, agent_id, compliance_status, resolved_at, resolved_by, resolution_notes, created_at, updated_at)
            VALUES (?1, ?2, 'resolved', ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(agent_id, session_id) DO UPDATE SET
                compliance_status = 'resolved',
                resolved_at = ?3,
                resolved_by = ?4,
                resolution_notes = ?5,
                updated_at = ?6
            "#,
            params![
                session_id,
                agent_id,
                now.to_rfc3339(),
                resolved_by,
                notes,
                now.to_rfc3339()
            ],
        )?;

        Ok(self
            .get_session_status(agent_id, session_id)?
            .expect("row just upserted"))
    }

    pub fn get_session_status(
        &self,
        agent_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionStatusRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT session_id, agent_id, compliance_status, resolved_at, resolved_by, resolution_notes, created_at, updated_at
                FROM session_status
                WHERE agent_id = ?1 AND session_id = ?2
                "#,
                params![agent_id, session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |(session_id, agent_id, status, resolved_at, resolved_by, notes, created, updated)| {
                Ok(SessionStatusRecord {
                    session_id,
                    agent_id,
                    compliance_status: status.as_deref().and_then(compliance_status_from_str),
                    resolved_at: parse_opt_ts(resolved_at)?,
                    resolved_by,
                    resolution_notes: notes,
                    created_at: parse_ts(&created)?,
                    updated_at: parse_ts(&updated)?,
                })
            },
        )
        .transpose()
    }

    pub fn list_session_statuses(&self, agent_id: &str) -> Result<Vec<SessionStatusRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, agent_id, compliance_status, resolved_at, resolved_by, resolution_notes, created_at, updated_at
            FROM session_status
            WHERE agent_id = ?1
            "#,
        )?;
        let rows = stmt
            .query_map([agent_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(session_id, agent_id, status, resolved_at, resolved_by, notes, created, updated)| {
                    Ok(SessionStatusRecord {
                        session_id,
                        agent_id,
                        compliance_status: status.as_deref().and_then(compliance_status_from_str),
                        resolved_at: parse_opt_ts(resolved_at)?,
                        resolved_by,
                        resolution_notes: notes,
                        created_at: parse_ts(&created)?,
                        updated_at: parse_ts(&updated)?,
                    })
                },
            )
            .collect()
    }

    // --- Jobs ---

    pub fn insert_job(&self, job: &ProcessingJob) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO processing_jobs
                (id, agent_id, status, job_type, total_items, completed_items, failed_items,
                 input, results, error_message, created_at, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                job.id,
                job.agent_id,
                job.status.as_str(),
                job.job_type,
                job.total_items,
                job.completed_items,
                job.failed_items,
                serde_json::to_string(&job.input)?,
                serde_json::to_string(&job.results)?,
                job.error_message,
                job.created_at.to_rfc3339(),
                job.started_at.map(|ts| ts.to_rfc3339()),
                job.completed_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<ProcessingJob>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, agent_id, status, job_type, total_items, completed_items, failed_items,
                       input, results, error_message, created_at, started_at, completed_at
                FROM processing_jobs
                WHERE id = ?1
                "#,
                [job_id],
                Self::job_row_tuple,
            )
            .optional()?;

        row.map(Self::job_from_tuple).transpose()
    }

    pub fn list_jobs(
        &self,
        agent_id: Option<&str>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ProcessingJob>> {
        let mut sql = String::from(
            r#"
            SELECT id, agent_id, status, job_type, total_items, completed_items, failed_items,
                   input, results, error_message, created_at, started_at, completed_at
            FROM processing_jobs
            WHERE 1 = 1
            "#,
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(agent_id) = agent_id {
            sql.push_str(&format!(" AND agent_id = ?{}", args.len() + 1));
            args.push(Box::new(agent_id.to_string()));
        }
        if let Some(status) = status {
            sql.push_str(&format!(" AND status = ?{}", args.len() + 1));
            args.push(Box::new(status.as_str()));
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT {}", limit));

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|arg| arg.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::job_row_tuple)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::job_from_tuple).collect()
    }

    pub fn update_job(&mut self, job_id: &str, update: &JobUpdate) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let existing = tx
            .query_row(
                "SELECT status FROM processing_jobs WHERE id = ?1",
                [job_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if existing.is_none() {
            return Ok(false);
        }

        if let Some(status) = update.status {
            tx.execute(
                "UPDATE processing_jobs SET status = ?2 WHERE id = ?1",
                params![job_id, status.as_str()],
            )?;
        }
        if let Some(completed) = update.completed_items {
            tx.execute(
                "UPDATE processing_jobs SET completed_items = ?2 WHERE id = ?1",
                params![job_id, completed],
            )?;
        }
        if let Some(failed) = update.failed_items {
            tx.execute(
                "UPDATE processing_jobs SET failed_items = ?2 WHERE id = ?1",
                params![job_id, failed],
            )?;
        }
        if let Some(results) = &update.results {
            tx.execute(
                "UPDATE processing_jobs SET results = ?2 WHERE id = ?1",
                params![job_id, serde_json::to_string(results)?],
            )?;
        }
        if let Some(error_message) = &update.error_message {
            tx.execute(
                "UPDATE processing_jobs SET error_message = ?2 WHERE id = ?1",
                params![job_id, error_message],
            )?;
        }
        if let Some(started_at) = update.started_at {
            tx.execute(
                "UPDATE processing_jobs SET started_at = ?2 WHERE id = ?1",
                params![job_id, started_at.to_rfc3339()],
            )?;
        }
        if let Some(completed_at) = update.completed_at {
            tx.execute(
                "UPDATE processing_jobs SET completed_at = ?2 WHERE id = ?1",
                params![job_id, completed_at.to_rfc3339()],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    pub fn delete_job(&self, job_id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM processing_jobs WHERE id = ?1", [job_id])?;
        Ok(changed > 0)
    }

    #[allow(clippy::type_complexity)]
    fn job_row_tuple(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(
        String,
        String,
        String,
        String,
        i64,
        i64,
        i64,
        String,
        String,
        Option<String>,
        String,
        Option<String>,
        Option<String>,
    )> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn job_from_tuple(
        tuple: (
            String,
            String,
            String,
            String,
            i64,
            i64,
            i64,
            String,
            String,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
        ),
    ) -> Result<ProcessingJob> {
        let (
            id,
            agent_id,
            status_raw,
            job_type,
            total_items,
            completed_items,
            failed_items,
            input_raw,
            results_raw,
            error_message,
            created_raw,
            started_raw,
            completed_raw,
        ) = tuple;

        Ok(ProcessingJob {
            id,
            agent_id,
            status: job_status_from_str(&status_raw),
            job_type,
            total_items,
            completed_items,
            failed_items,
            input: serde_json::from_str(&input_raw)?,
            results: serde_json::from_str(&results_raw)?,
            error_message,
            created_at: parse_ts(&created_raw)?,
            started_at: parse_opt_ts(started_raw)?,
            completed_at: parse_opt_ts(completed_raw)?,
        })
    }
}
