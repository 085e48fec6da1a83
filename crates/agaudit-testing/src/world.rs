//! Scratch environment: a temp session tree plus a temp store, laid out the
//! way the CLI expects them.

use agaudit_store::Store;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct SessionWorld {
    _dir: TempDir,
    sessions_root: PathBuf,
    store_path: PathBuf,
}

impl Default for SessionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionWorld {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let sessions_root = dir.path().join("sessions");
        let store_path = dir.path().join("agaudit.db");
        std::fs::create_dir_all(&sessions_root).expect("sessions root");
        SessionWorld {
            _dir: dir,
            sessions_root,
            store_path,
        }
    }

    pub fn sessions_root(&self) -> &Path {
        &self.sessions_root
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn open_store(&self) -> Store {
        Store::open(&self.store_path).expect("open temp store")
    }

    /// Write a session file under `<root>/<agent>/<session id>.json`
    pub fn write_session(&self, agent_id: &str, session_id: &str, content: &Value) {
        let agent_dir = self.sessions_root.join(agent_id);
        std::fs::create_dir_all(&agent_dir).expect("agent dir");
        std::fs::write(
            agent_dir.join(format!("{}.json", session_id)),
            serde_json::to_string_pretty(content).expect("serialize session"),
        )
        .expect("write session file");
    }

    /// Write a session file from a message list
    pub fn write_messages(&self, agent_id: &str, session_id: &str, messages: &Value) {
        self.write_session(agent_id, session_id, messages);
    }
}
