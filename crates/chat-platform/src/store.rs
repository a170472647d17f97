//! Thread store backed by the envelope API.
//!
//! Every call is a POST of `{ service: "agent", operation, data }` answered
//! by `{ success, data?, error? }`. Transport faults and `success: false`
//! both come back as `ChatError::Persistence`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use chat_core::ports::ThreadStore;
use chat_types::{
    ChatError, Result,
    api::{
        operation, ApiEnvelope, Deleted, GetThreadsRequest, SendMessageRequest,
        SendMessageResponse, ServiceRequest, ThreadIdRequest, TokenUsageRequest,
        TokenUsageResponse, UpdateThreadRequest, Updated,
    },
    config::{EndpointConfig, Settings},
    thread::{NewThread, Thread, ThreadUpdates},
    usage::UsageTotals,
};
use crate::http::{check_status, post_json};

pub struct HttpThreadStore {
    url: String,
    app: String,
}

/// Faults that did not come from the envelope itself
fn as_persistence(error: ChatError) -> ChatError {
    match error {
        ChatError::Persistence(_) => error,
        other => ChatError::Persistence(other.to_string()),
    }
}

impl HttpThreadStore {
    pub fn new(url: impl Into<String>, app: impl Into<String>) -> Self {
        Self { url: url.into(), app: app.into() }
    }

    pub fn from_config(endpoint: &EndpointConfig) -> Self {
        Self::new(endpoint.api_url.clone(), endpoint.app.clone())
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, data: impl Serialize) -> Result<ApiEnvelope<T>> {
        let request = ServiceRequest::agent(op, data)?;
        let response = post_json(&self.url, &self.app, &request).await?;
        let response = check_status(response).await?;
        response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|e| ChatError::Serialization(e.to_string()))
    }

    /// One envelope round trip; the envelope must carry data.
    async fn fetch<T: DeserializeOwned>(&self, op: &str, data: impl Serialize) -> Result<T> {
        let result = match self.call(op, data).await {
            Ok(envelope) => envelope.into_data(),
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            log::warn!("{} failed: {}", op, e);
            as_persistence(e)
        })
    }

    /// One envelope round trip where only success matters.
    async fn execute(&self, op: &str, data: impl Serialize) -> Result<()> {
        let result = match self.call::<serde_json::Value>(op, data).await {
            Ok(envelope) => envelope.into_result().map(|_| ()),
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            log::warn!("{} failed: {}", op, e);
            as_persistence(e)
        })
    }
}

#[async_trait(?Send)]
impl ThreadStore for HttpThreadStore {
    async fn get_threads(&self, limit: usize) -> Result<Vec<Thread>> {
        self.fetch(operation::GET_THREADS, GetThreadsRequest { limit }).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        let request = ThreadIdRequest { thread_id: thread_id.to_string() };
        self.fetch(operation::GET_THREAD, request).await
    }

    async fn create_thread(&self, request: NewThread) -> Result<Thread> {
        self.fetch(operation::CREATE_THREAD, request).await
    }

    async fn update_thread(&self, thread_id: &str, updates: ThreadUpdates) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let request = UpdateThreadRequest { thread_id: thread_id.to_string(), updates };
        let updated: Updated = self.fetch(operation::UPDATE_THREAD, request).await?;
        if !updated.updated {
            log::warn!("Store reported thread {} unchanged", thread_id);
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let request = ThreadIdRequest { thread_id: thread_id.to_string() };
        let deleted: Deleted = self.fetch(operation::DELETE_THREAD, request).await?;
        if !deleted.deleted {
            return Err(ChatError::Persistence(format!("thread {} was not deleted", thread_id)));
        }
        Ok(())
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
        self.fetch(operation::SEND_MESSAGE, request).await
    }

    async fn get_token_usage(&self, period: &str) -> Result<Option<UsageTotals>> {
        let request = TokenUsageRequest { period: period.to_string() };
        let envelope = self
            .call::<TokenUsageResponse>(operation::GET_TOKEN_USAGE, request)
            .await
            .and_then(ApiEnvelope::into_result)
            .map_err(as_persistence)?;
        Ok(envelope.map(|response| response.usage))
    }

    async fn update_settings(&self, settings: &Settings) -> Result<()> {
        self.execute(operation::UPDATE_SETTINGS, settings).await
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}
