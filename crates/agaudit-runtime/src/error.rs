use std::fmt;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the batch pipeline
#[derive(Debug)]
pub enum Error {
    /// Requested session, policy or job does not exist
    NotFound(String),
    /// Rejected submission or operation (empty inputs, running-job deletion)
    InvalidInput(String),
    /// Error from the session store layer
    Session(agaudit_sessions::Error),
    /// Error from the metadata store layer
    Store(anyhow::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Session(err) => write!(f, "{}", err),
            Error::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Session(err) => Some(err),
            Error::Store(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<agaudit_sessions::Error> for Error {
    fn from(err: agaudit_sessions::Error) -> Self {
        Error::Session(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Store(err)
    }
}
