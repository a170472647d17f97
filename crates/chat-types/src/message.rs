use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a thread.
///
/// `thread_id` is a back-reference only; the owning [`crate::thread::Thread`]
/// holds the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    /// Tool invocations attached to this message
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_runs: Vec<ToolRun>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_usage: Option<MessageUsage>,
    pub created_at: String,
}

/// Per-message token breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUsage {
    pub input: u64,
    pub output: u64,
    /// Set when the counts were approximated from text length
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub estimated: bool,
}

impl MessageUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolRunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// A tool invocation attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRun {
    pub id: String,
    pub name: String,
    pub status: ToolRunStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<Value>,
}

impl Message {
    fn new(thread_id: &str, role: Role, content: String) -> Self {
        Self {
            id: new_message_id(),
            thread_id: thread_id.to_string(),
            role,
            content,
            tool_runs: Vec::new(),
            token_usage: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn system(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new(thread_id, Role::System, text.into())
    }

    pub fn user(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new(thread_id, Role::User, text.into())
    }

    pub fn assistant(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new(thread_id, Role::Assistant, text.into())
    }

    pub fn with_usage(mut self, usage: MessageUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }
}

pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}
