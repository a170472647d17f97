//! Request/response shapes of the envelope API shared by the thread store,
//! the non-streaming send path, and the chat-stream endpoint.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::error::ChatError;
use crate::message::Message;
use crate::thread::Thread;
use crate::usage::UsageTotals;
use crate::Result;

pub const AGENT_SERVICE: &str = "agent";

/// Operations understood by the agent service
pub mod operation {
    pub const GET_THREADS: &str = "getThreads";
    pub const GET_THREAD: &str = "getThread";
    pub const CREATE_THREAD: &str = "createThread";
    pub const UPDATE_THREAD: &str = "updateThread";
    pub const DELETE_THREAD: &str = "deleteThread";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const STREAM_MESSAGE: &str = "streamMessage";
    pub const GET_TOKEN_USAGE: &str = "getTokenUsage";
    pub const UPDATE_SETTINGS: &str = "updateSettings";
}

/// `{ service, operation, data }` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service: String,
    pub operation: String,
    #[serde(default)]
    pub data: Value,
}

impl ServiceRequest {
    pub fn agent(operation: &str, data: impl Serialize) -> Result<Self> {
        Ok(Self {
            service: AGENT_SERVICE.to_string(),
            operation: operation.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Uniform `{ success, data?, error? }` response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// `success: false` becomes a persistence fault carrying the server's
    /// message.
    pub fn into_result(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ChatError::Persistence(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }

    /// Like `into_result`, but a successful envelope must carry data.
    pub fn into_data(self) -> Result<T> {
        self.into_result()?
            .ok_or_else(|| ChatError::Persistence("response carried no data".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetThreadsRequest {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadIdRequest {
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThreadRequest {
    pub thread_id: String,
    pub updates: crate::thread::ThreadUpdates,
}

/// Body of `sendMessage` and `streamMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub thread_id: String,
    pub message: String,
    pub settings: Settings,
}

/// Result of a non-streaming exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    /// The thread after both messages were appended
    pub thread: Thread,
    /// The assistant reply
    pub message: Message,
    /// Usage of this exchange
    #[serde(default)]
    pub token_usage: UsageTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageRequest {
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageResponse {
    pub period: String,
    pub usage: UsageTotals,
    #[serde(default)]
    pub thread_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Updated {
    pub updated: bool,
}
