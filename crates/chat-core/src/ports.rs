//! Port traits — the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Browser implementations live in `chat-platform`.
//! The core never imports platform code; it only depends on these traits.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use async_trait::async_trait;
use futures::Stream;
use chat_types::{
    Result,
    api::{SendMessageRequest, SendMessageResponse, ServiceRequest},
    config::Settings,
    stream::{GenerateResult, PromptMessage, StreamPart},
    thread::{NewThread, Thread, ThreadUpdates},
    usage::UsageTotals,
};
use crate::adapter::InvokeAgentRequest;

/// Raw response body, one item per increment as it arrives
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + 'a>>;

/// Lifecycle parts of one streamed generation
pub type PartStream<'a> = Pin<Box<dyn Stream<Item = StreamPart> + 'a>>;

// ─── Language Model Port ─────────────────────────────────────

/// A model backend presented through the uniform generate/stream contract.
#[async_trait(?Send)]
pub trait LanguageModel {
    /// Provider label, e.g. `remote-agent`
    fn provider(&self) -> &str;

    fn model_id(&self) -> &str;

    /// Single-shot generation
    async fn generate(&self, prompt: &[PromptMessage]) -> Result<GenerateResult>;

    /// Streamed generation. Never fails up front: faults arrive as a
    /// terminal `StreamPart::Error`.
    fn stream(&self, prompt: &[PromptMessage]) -> PartStream<'_>;
}

// ─── Remote Agent RPC Port ───────────────────────────────────

/// The remote agent-invocation call: one request, zero or more byte chunks.
#[async_trait(?Send)]
pub trait AgentInvoker {
    async fn invoke<'a>(&'a self, request: InvokeAgentRequest) -> Result<ByteStream<'a>>;
}

// ─── Chat Transport Port ─────────────────────────────────────

/// Carries one `streamMessage` request to the chat-stream endpoint and hands
/// back the event-stream body unbuffered.
#[async_trait(?Send)]
pub trait ChatTransport {
    async fn open<'a>(&'a self, request: &ServiceRequest) -> Result<ByteStream<'a>>;
}

// ─── Thread Store Port ───────────────────────────────────────

/// The external persistence collaborator.
///
/// Implementations map both `success: false` envelopes and transport faults
/// to `ChatError::Persistence`.
#[async_trait(?Send)]
pub trait ThreadStore {
    /// Most recently updated first
    async fn get_threads(&self, limit: usize) -> Result<Vec<Thread>>;

    async fn get_thread(&self, thread_id: &str) -> Result<Thread>;

    async fn create_thread(&self, request: NewThread) -> Result<Thread>;

    async fn update_thread(&self, thread_id: &str, updates: ThreadUpdates) -> Result<()>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Non-streaming exchange: appends the user and assistant messages
    /// server-side and returns the updated thread.
    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse>;

    /// `Ok(None)` means usage is unavailable, not zero.
    async fn get_token_usage(&self, period: &str) -> Result<Option<UsageTotals>>;

    async fn update_settings(&self, settings: &Settings) -> Result<()>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Timer Port ──────────────────────────────────────────────

/// Wall-clock sleep, used to bound a stream.
pub trait Timer {
    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()>>>;
}

// ─── Shared Handles ──────────────────────────────────────────

#[async_trait(?Send)]
impl<M: LanguageModel + ?Sized> LanguageModel for Rc<M> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    async fn generate(&self, prompt: &[PromptMessage]) -> Result<GenerateResult> {
        (**self).generate(prompt).await
    }

    fn stream(&self, prompt: &[PromptMessage]) -> PartStream<'_> {
        (**self).stream(prompt)
    }
}

#[async_trait(?Send)]
impl<T: ChatTransport + ?Sized> ChatTransport for Rc<T> {
    async fn open<'a>(&'a self, request: &ServiceRequest) -> Result<ByteStream<'a>> {
        (**self).open(request).await
    }
}

#[async_trait(?Send)]
impl<S: ThreadStore + ?Sized> ThreadStore for Rc<S> {
    async fn get_threads(&self, limit: usize) -> Result<Vec<Thread>> {
        (**self).get_threads(limit).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        (**self).get_thread(thread_id).await
    }

    async fn create_thread(&self, request: NewThread) -> Result<Thread> {
        (**self).create_thread(request).await
    }

    async fn update_thread(&self, thread_id: &str, updates: ThreadUpdates) -> Result<()> {
        (**self).update_thread(thread_id, updates).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        (**self).delete_thread(thread_id).await
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
        (**self).send_message(request).await
    }

    async fn get_token_usage(&self, period: &str) -> Result<Option<UsageTotals>> {
        (**self).get_token_usage(period).await
    }

    async fn update_settings(&self, settings: &Settings) -> Result<()> {
        (**self).update_settings(settings).await
    }

    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }
}
