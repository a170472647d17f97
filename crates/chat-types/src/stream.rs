//! The provider-agnostic language-model contract: prompt in, either a whole
//! result or an ordered sequence of lifecycle parts out.

use serde::{Deserialize, Serialize};
use crate::error::ChatError;
use crate::message::{Message, Role};
use crate::usage::Usage;

/// Text shown in place of a reply when a backend streams nothing.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I didn't receive a response from the agent. Please try again.";

/// One turn of prompt history handed to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

impl From<&Message> for PromptMessage {
    fn from(m: &Message) -> Self {
        Self::new(m.role, m.content.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
    Other,
}

impl FinishReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// Non-fatal advisory attached to `StreamStart`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallWarning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
}

impl CallWarning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.to_string()),
        }
    }
}

/// Result of a single-shot generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResult {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub warnings: Vec<CallWarning>,
}

/// One lifecycle event of a streamed generation.
///
/// Every stream is `StreamStart`, then any number of `TextDelta`, then
/// exactly one of `Finish` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    StreamStart {
        warnings: Vec<CallWarning>,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    Error {
        error: ChatError,
    },
}

impl StreamPart {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamPart::StreamStart { .. } => "stream-start",
            StreamPart::TextDelta { .. } => "text-delta",
            StreamPart::Finish { .. } => "finish",
            StreamPart::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamPart::Finish { .. } | StreamPart::Error { .. })
    }
}

/// JSON body of one `data: ` line on the chat-stream endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl StreamPayload {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: None,
            error: Some(message.into()),
        }
    }
}
