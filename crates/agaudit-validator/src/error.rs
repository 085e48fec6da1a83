use std::fmt;

/// Error types that can occur when calling an LLM validator.
///
/// Auth and billing failures are kept distinct from transient transport
/// errors so operators can tell a misconfigured key from a flaky network.
#[derive(Debug)]
pub enum ValidatorError {
    /// Missing or rejected API credentials
    Auth(String),
    /// Credit or quota exhaustion reported by the provider
    Billing(String),
    /// Network or transport failure; usually retryable
    Transport(String),
    /// Any other error surfaced by the provider
    Provider(String),
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorError::Auth(msg) => write!(f, "Auth error: {}", msg),
            ValidatorError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ValidatorError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ValidatorError::Provider(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for ValidatorError {}
