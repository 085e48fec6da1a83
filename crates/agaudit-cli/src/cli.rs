use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "agaudit",
    version,
    about = "Audit recorded AI agent sessions against compliance policies"
)]
pub struct Cli {
    /// Data directory holding the store and config (default: platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Sessions root override (default: from config.toml)
    #[arg(long, global = true)]
    pub sessions_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the config file pointing at a sessions root
    Init {
        #[arg(long)]
        sessions_root: PathBuf,
    },

    /// List agents found under the sessions root
    Agents,

    /// Inspect recorded sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },

    /// Manage compliance policies
    Policies {
        #[command(subcommand)]
        command: PoliciesCommand,
    },

    /// Evaluate one session against policies and store the results
    Evaluate {
        #[arg(long)]
        agent: String,
        session_id: String,
        /// Restrict to specific policy ids (default: all enabled)
        #[arg(long = "policy")]
        policy_ids: Vec<i64>,
    },

    /// Batch evaluation jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },

    /// Tool-sequence variants and transitions
    Variants {
        #[command(subcommand)]
        command: VariantsCommand,
    },

    /// Compliance rollup for an agent
    Summary {
        #[arg(long)]
        agent: String,
        /// Print the rollup as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a session's compliance issues as resolved
    Resolve {
        #[arg(long)]
        agent: String,
        session_id: String,
        /// Who resolved it
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// List sessions for an agent
    List {
        #[arg(long)]
        agent: String,
    },
    /// Show one session's metadata and tool sequence
    Show {
        #[arg(long)]
        agent: String,
        session_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PoliciesCommand {
    /// List policies for an agent
    List {
        #[arg(long)]
        agent: String,
    },
    /// Show one policy including its config
    Show {
        #[arg(long)]
        agent: String,
        policy_id: i64,
    },
    /// Add a policy from a JSON file
    Add {
        #[arg(long)]
        agent: String,
        /// JSON file: {"name", "description"?, "severity"?, "enabled"?, "config"}
        #[arg(long)]
        file: PathBuf,
    },
    /// Enable a policy
    Enable {
        #[arg(long)]
        agent: String,
        policy_id: i64,
    },
    /// Disable a policy
    Disable {
        #[arg(long)]
        agent: String,
        policy_id: i64,
    },
    /// Delete a policy and its evaluations
    Remove {
        #[arg(long)]
        agent: String,
        policy_id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// Submit a batch evaluation job and wait for it to finish
    Submit {
        #[arg(long)]
        agent: String,
        /// Session ids to process (repeatable)
        #[arg(long = "session")]
        session_ids: Vec<String>,
        /// Process every session of the agent
        #[arg(long, conflicts_with = "session_ids")]
        all: bool,
        /// Restrict to specific policy ids (default: all enabled)
        #[arg(long = "policy")]
        policy_ids: Vec<i64>,
        /// Rebuild variants and transitions after the batch
        #[arg(long)]
        refresh_variants: bool,
    },
    /// Show a job's status
    Status { job_id: String },
    /// Show a job's full results
    Result { job_id: String },
    /// List recent jobs
    List {
        #[arg(long)]
        agent: Option<String>,
        /// Filter by status (pending|running|completed|failed)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete a job record (running jobs are refused)
    Delete { job_id: String },
}

#[derive(Debug, Subcommand)]
pub enum VariantsCommand {
    /// Recompute variants and transitions from evaluated sessions
    Refresh {
        #[arg(long)]
        agent: String,
    },
    /// List variants for an agent
    List {
        #[arg(long)]
        agent: String,
    },
    /// Print transition counts (aggregate or per variant)
    Transitions {
        #[arg(long)]
        agent: String,
        /// Restrict to one variant id (default: agent-wide aggregate)
        #[arg(long)]
        variant: Option<i64>,
        /// Emit CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
}
