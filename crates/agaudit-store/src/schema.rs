// NOTE: Store design rationale
//
// Why short-lived handles instead of one long-lived connection?
// - Policy evaluation suspends on LLM calls that can take seconds; a handle
//   held across a suspension would pin a connection (and any transaction)
//   for the whole call
// - Background jobs run on their own tasks and must not share a connection
//   with the submitting caller
// - SQLite opens are cheap; the handle gauge makes the discipline testable
//
// Why delete-then-insert for re-evaluation?
// - Consumers always see exactly one current evaluation per
//   (agent, session, policy); no need to reason about supersession order
//
// Why TEXT timestamps?
// - RFC-3339 strings sort correctly, diff cleanly and round-trip through
//   chrono without schema support

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    severity TEXT NOT NULL DEFAULT 'error',
    enabled BOOLEAN NOT NULL DEFAULT 1,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    policy_id INTEGER NOT NULL,
    is_compliant BOOLEAN NOT NULL,
    details TEXT NOT NULL DEFAULT '[]',
    evaluated_at TEXT NOT NULL,
    FOREIGN KEY (policy_id) REFERENCES policies(id)
);

CREATE TABLE IF NOT EXISTS agent_variants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    signature TEXT NOT NULL,
    name TEXT NOT NULL,
    normalized_sequence TEXT NOT NULL,
    sequence_display TEXT NOT NULL,
    session_ids TEXT NOT NULL DEFAULT '[]',
    tool_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (agent_id, signature)
);

CREATE TABLE IF NOT EXISTS tool_transitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL,
    from_tool TEXT NOT NULL,
    to_tool TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    variant_id INTEGER,
    FOREIGN KEY (variant_id) REFERENCES agent_variants(id)
);

CREATE TABLE IF NOT EXISTS session_status (
    session_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    compliance_status TEXT,
    resolved_at TEXT,
    resolved_by TEXT,
    resolution_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (agent_id, session_id)
);

CREATE TABLE IF NOT EXISTS processing_jobs (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    job_type TEXT NOT NULL DEFAULT 'batch_evaluate',
    total_items INTEGER NOT NULL DEFAULT 0,
    completed_items INTEGER NOT NULL DEFAULT 0,
    failed_items INTEGER NOT NULL DEFAULT 0,
    input TEXT NOT NULL DEFAULT '{}',
    results TEXT NOT NULL DEFAULT '[]',
    error_message TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_policies_agent ON policies(agent_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_agent_session ON evaluations(agent_id, session_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_policy ON evaluations(policy_id);
CREATE INDEX IF NOT EXISTS idx_variants_agent ON agent_variants(agent_id);
CREATE INDEX IF NOT EXISTS idx_transitions_agent ON tool_transitions(agent_id);
CREATE INDEX IF NOT EXISTS idx_jobs_agent ON processing_jobs(agent_id);
CREATE INDEX IF NOT EXISTS idx_jobs_created ON processing_jobs(created_at DESC);
"#;
