use crate::Result;
use agaudit_types::{Session, SessionSummary};

/// Read-only source of recorded sessions.
///
/// Responsibilities:
/// - Enumerate agents and their sessions
/// - Load a session's messages and metadata by id
///
/// The engine treats sessions as immutable inputs; implementations must be
/// safe to share across concurrent workers.
pub trait SessionStore: Send + Sync {
    /// Agent ids known to this store
    fn list_agents(&self) -> Result<Vec<String>>;

    /// Sessions recorded for an agent. Files that fail to parse are logged
    /// and excluded rather than failing the listing.
    fn list_sessions(&self, agent_id: &str) -> Result<Vec<SessionSummary>>;

    /// Load one session. Returns Ok(None) when the id is unknown.
    fn load_session(&self, agent_id: &str, session_id: &str) -> Result<Option<Session>>;
}
