//! Remote agent adapter.
//!
//! Presents a remote agent-execution backend as a [`LanguageModel`]. The
//! backend keeps its own session memory, so only the latest user turn is
//! sent; the reply comes back as raw byte chunks that are decoded with
//! [`ChunkDecoder`] and surfaced either whole or as one text delta per chunk.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use chat_types::{
    ChatError, Result,
    message::Role,
    stream::{CallWarning, FinishReason, GenerateResult, PromptMessage, StreamPart, FALLBACK_REPLY},
    usage::Usage,
};
use crate::chunk::ChunkDecoder;
use crate::ports::{AgentInvoker, ByteStream, LanguageModel, PartStream};

pub const PROVIDER: &str = "remote-agent";
pub const DEFAULT_AGENT_ALIAS_ID: &str = "TSTALIASID";

/// Request body of the remote agent-invocation RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeAgentRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
}

/// Per-model overrides; unset fields fall back to the model id, the test
/// alias, and a fresh session id per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAgentSettings {
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
    pub session_id: Option<String>,
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct RemoteAgentModel<I> {
    model_id: String,
    settings: RemoteAgentSettings,
    invoker: I,
    id_generator: fn() -> String,
}

impl<I: AgentInvoker> RemoteAgentModel<I> {
    pub fn new(model_id: impl Into<String>, settings: RemoteAgentSettings, invoker: I) -> Self {
        Self {
            model_id: model_id.into(),
            settings,
            invoker,
            id_generator: generate_id,
        }
    }

    /// Replace the id source used for session ids and delta ids.
    pub fn with_id_generator(mut self, id_generator: fn() -> String) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Build the RPC body from the prompt. Only the most recent user turn is
    /// sent; everything else is reported back as a warning.
    pub fn build_request(&self, prompt: &[PromptMessage]) -> (InvokeAgentRequest, Vec<CallWarning>) {
        let mut warnings = Vec::new();

        let last_user = prompt.iter().rposition(|m| m.role == Role::User);
        let input_text = match last_user {
            Some(index) => prompt[index].content.clone(),
            None => {
                warnings.push(CallWarning::new(
                    "no-user-message",
                    "prompt has no user message; sending empty input",
                ));
                String::new()
            }
        };

        let ignored = prompt.len() - usize::from(last_user.is_some());
        if ignored > 0 {
            warnings.push(CallWarning::new(
                "history-ignored",
                format!(
                    "only the last user message is used; {} earlier turn(s) ignored",
                    ignored
                ),
            ));
        }

        let request = InvokeAgentRequest {
            agent_id: self
                .settings
                .agent_id
                .clone()
                .unwrap_or_else(|| self.model_id.clone()),
            agent_alias_id: self
                .settings
                .agent_alias_id
                .clone()
                .unwrap_or_else(|| DEFAULT_AGENT_ALIAS_ID.to_string()),
            session_id: self
                .settings
                .session_id
                .clone()
                .unwrap_or_else(self.id_generator),
            input_text,
        };

        (request, warnings)
    }
}

#[async_trait(?Send)]
impl<I: AgentInvoker> LanguageModel for RemoteAgentModel<I> {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &[PromptMessage]) -> Result<GenerateResult> {
        let (request, warnings) = self.build_request(prompt);
        log::debug!(
            "Invoking agent {} (session {})",
            request.agent_id,
            request.session_id
        );

        let mut chunks = self
            .invoker
            .invoke(request)
            .await
            .map_err(|e| ChatError::remote_agent("error", e))?;

        let mut decoder = ChunkDecoder::new();
        let mut content = String::new();
        while let Some(chunk) = chunks.next().await {
            let bytes = chunk.map_err(|e| ChatError::remote_agent("error", e))?;
            content.push_str(&decoder.decode(&bytes));
        }
        content.push_str(&decoder.finish());

        Ok(GenerateResult {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage::unknown(),
            warnings,
        })
    }

    fn stream(&self, prompt: &[PromptMessage]) -> PartStream<'_> {
        let (request, warnings) = self.build_request(prompt);
        let id_generator = self.id_generator;

        let start = stream::once(async move { StreamPart::StreamStart { warnings } });
        let body = stream::once(async move {
            match self.invoker.invoke(request).await {
                Ok(chunks) => relay(chunks, id_generator).left_stream(),
                Err(e) => stream::iter([StreamPart::Error {
                    error: ChatError::remote_agent("stream error", e),
                }])
                .right_stream(),
            }
        })
        .flatten();

        Box::pin(start.chain(body))
    }
}

struct Relay<'a> {
    chunks: ByteStream<'a>,
    decoder: ChunkDecoder,
    has_content: bool,
    pending: VecDeque<StreamPart>,
    finished: bool,
    id_generator: fn() -> String,
}

impl Relay<'_> {
    /// Whitespace-only chunks are dropped.
    fn push_delta(&mut self, delta: String) {
        if delta.trim().is_empty() {
            return;
        }
        self.has_content = true;
        let id = (self.id_generator)();
        self.pending.push_back(StreamPart::TextDelta { id, delta });
    }

    fn end(&mut self) {
        let tail = self.decoder.finish();
        self.push_delta(tail);
        if !self.has_content {
            log::warn!("Agent returned no content; substituting fallback reply");
            let id = (self.id_generator)();
            self.pending.push_back(StreamPart::TextDelta {
                id,
                delta: FALLBACK_REPLY.to_string(),
            });
        }
        self.pending.push_back(StreamPart::Finish {
            finish_reason: FinishReason::Stop,
            usage: Usage::unknown(),
        });
        self.finished = true;
    }
}

/// One delta per decoded chunk, in arrival order, then the terminal part.
fn relay(chunks: ByteStream<'_>, id_generator: fn() -> String) -> PartStream<'_> {
    let state = Relay {
        chunks,
        decoder: ChunkDecoder::new(),
        has_content: false,
        pending: VecDeque::new(),
        finished: false,
        id_generator,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(part) = state.pending.pop_front() {
                return Some((part, state));
            }
            if state.finished {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(bytes)) => {
                    let text = state.decoder.decode(&bytes);
                    state.push_delta(text);
                }
                Some(Err(e)) => {
                    log::warn!("Agent stream failed: {}", e);
                    state.pending.push_back(StreamPart::Error {
                        error: ChatError::remote_agent("stream error", e),
                    });
                    state.finished = true;
                }
                None => state.end(),
            }
        }
    }))
}
