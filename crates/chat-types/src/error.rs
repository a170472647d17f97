use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Fault raised by the remote agent backend or model provider.
    #[error("{0}")]
    Backend(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("A stream is already in progress for thread {thread_id}")]
    StreamInProgress { thread_id: String },

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Wrap a backend fault under the remote agent's stable prefix.
    pub fn remote_agent(context: &str, cause: impl std::fmt::Display) -> Self {
        ChatError::Backend(format!("remote agent {}: {}", context, cause))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
