use crate::{Error, Result, SessionStore};
use agaudit_types::{ContentBlock, Message, Session, SessionMetadata, SessionSummary};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem-backed session store.
///
/// Layout: `<root>/<agent_id>/<session_id>.json`. A session file is either a
/// bare JSON array of messages or an object `{messages, metadata}`. The
/// session id is the file stem; the agent id is the directory name.
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, agent_id: &str, session_id: &str) -> PathBuf {
        self.root.join(agent_id).join(format!("{}.json", session_id))
    }

    fn parse_session(path: &Path, agent_id: &str, session_id: &str) -> Result<Session> {
        let raw = std::fs::read_to_string(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|source| Error::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let (messages_value, metadata_value) = match value {
            serde_json::Value::Array(_) => (value, None),
            serde_json::Value::Object(mut map) => {
                let messages = map
                    .remove("messages")
                    .unwrap_or(serde_json::Value::Array(vec![]));
                (messages, map.remove("metadata"))
            }
            _ => {
                return Err(Error::Malformed {
                    path: path.to_path_buf(),
                    source: serde::de::Error::custom("session file must be a JSON array or object"),
                });
            }
        };

        let messages: Vec<Message> =
            serde_json::from_value(messages_value).map_err(|source| Error::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let metadata: SessionMetadata = match metadata_value {
            Some(value) => serde_json::from_value(value).map_err(|source| Error::Malformed {
                path: path.to_path_buf(),
                source,
            })?,
            None => SessionMetadata::default(),
        };

        reject_reserved_tool_names(path, &messages)?;

        Ok(Session {
            id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            messages,
            metadata,
        })
    }
}

/// Leading underscores collide with the `_start` / `_end` sentinels in the
/// transition table, so such sessions are refused at ingest.
fn reject_reserved_tool_names(path: &Path, messages: &[Message]) -> Result<()> {
    for message in messages {
        for block in message.content.blocks() {
            if let ContentBlock::ToolUse { name, .. } = block
                && name.starts_with('_')
            {
                return Err(Error::ReservedToolName {
                    path: path.to_path_buf(),
                    tool_name: name.clone(),
                });
            }
        }
    }
    Ok(())
}

impl SessionStore for FsSessionStore {
    fn list_agents(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut agents: Vec<String> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        agents.sort();
        Ok(agents)
    }

    fn list_sessions(&self, agent_id: &str) -> Result<Vec<SessionSummary>> {
        let agent_dir = self.root.join(agent_id);
        if !agent_dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in WalkDir::new(&agent_dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match Self::parse_session(path, agent_id, session_id) {
                Ok(session) => {
                    let modified_at = entry
                        .metadata()
                        .ok()
                        .and_then(|meta| meta.modified().ok())
                        .map(DateTime::<Utc>::from);
                    summaries.push(SessionSummary {
                        id: session.id,
                        agent_id: agent_id.to_string(),
                        file_name: entry.file_name().to_string_lossy().to_string(),
                        message_count: session.messages.len(),
                        modified_at,
                    });
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable session file");
                }
            }
        }

        Ok(summaries)
    }

    fn load_session(&self, agent_id: &str, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_path(agent_id, session_id);
        if !path.exists() {
            return Ok(None);
        }
        Self::parse_session(&path, agent_id, session_id).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_session(dir: &Path, agent: &str, id: &str, content: &str) {
        let agent_dir = dir.join(agent);
        std::fs::create_dir_all(&agent_dir).unwrap();
        std::fs::write(agent_dir.join(format!("{}.json", id)), content).unwrap();
    }

    #[test]
    fn loads_bare_message_list() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "billing",
            "s1",
            r#"[{"role": "user", "content": "hello"}]"#,
        );

        let store = FsSessionStore::new(tmp.path());
        let session = store.load_session("billing", "s1").unwrap().unwrap();
        assert_eq!(session.id, "s1");
        assert_eq!(session.messages.len(), 1);
        assert!(session.metadata.session_id.is_none());
    }

    #[test]
    fn loads_object_with_metadata() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "billing",
            "s2",
            r#"{
                "messages": [{"role": "user", "content": "hi"}],
                "metadata": {
                    "session_id": "s2",
                    "user_id": "u-1",
                    "tags": ["vip"],
                    "unknown_field": 42
                }
            }"#,
        );

        let store = FsSessionStore::new(tmp.path());
        let session = store.load_session("billing", "s2").unwrap().unwrap();
        assert_eq!(session.metadata.user_id.as_deref(), Some("u-1"));
        assert_eq!(session.metadata.tags, vec!["vip"]);
    }

    #[test]
    fn unknown_session_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FsSessionStore::new(tmp.path());
        assert!(store.load_session("billing", "nope").unwrap().is_none());
    }

    #[test]
    fn listing_skips_malformed_files() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "billing",
            "good",
            r#"[{"role": "user", "content": "ok"}]"#,
        );
        write_session(tmp.path(), "billing", "broken", "{not json");

        let store = FsSessionStore::new(tmp.path());
        let sessions = store.list_sessions("billing").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "good");
    }

    #[test]
    fn rejects_reserved_tool_names() {
        let tmp = TempDir::new().unwrap();
        write_session(
            tmp.path(),
            "billing",
            "bad",
            r#"[{
                "role": "assistant",
                "content": [{"type": "tool_use", "id": "t1", "name": "_start", "input": {}}]
            }]"#,
        );

        let store = FsSessionStore::new(tmp.path());
        let err = store.load_session("billing", "bad").unwrap_err();
        assert!(matches!(err, Error::ReservedToolName { .. }));
        assert!(store.list_sessions("billing").unwrap().is_empty());
    }

    #[test]
    fn lists_agents_from_directories() {
        let tmp = TempDir::new().unwrap();
        write_session(tmp.path(), "billing", "s1", "[]");
        write_session(tmp.path(), "support", "s1", "[]");

        let store = FsSessionStore::new(tmp.path());
        assert_eq!(store.list_agents().unwrap(), vec!["billing", "support"]);
    }
}
