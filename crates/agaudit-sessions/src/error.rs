use std::fmt;
use std::path::PathBuf;

/// Result type for session store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while listing or loading sessions
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),
    /// Session file is not valid JSON or does not follow the session shape
    Malformed { path: PathBuf, source: serde_json::Error },
    /// A tool name in the session starts with an underscore, which is
    /// reserved for the `_start` / `_end` transition sentinels
    ReservedToolName { path: PathBuf, tool_name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Malformed { path, source } => {
                write!(f, "Malformed session file {}: {}", path.display(), source)
            }
            Error::ReservedToolName { path, tool_name } => write!(
                f,
                "Session file {} uses reserved tool name '{}' (leading underscore)",
                path.display(),
                tool_name
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Malformed { source, .. } => Some(source),
            Error::ReservedToolName { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
