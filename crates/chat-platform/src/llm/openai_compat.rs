//! OpenAI-compatible model adapter.
//!
//! Works with OpenAI, DeepSeek, and any provider using the chat completions
//! API format. Unlike the remote agent it sends the full prompt history and
//! reports real token usage when the provider includes it.
//! Uses browser `fetch()` via gloo-net for WASM compatibility.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::adapter::generate_id;
use chat_core::ports::{ByteStream, LanguageModel, PartStream};
use chat_core::sse::{LineSplitter, DATA_PREFIX, DONE_MARKER};
use chat_types::{
    ChatError, Result,
    config::Settings,
    stream::{FinishReason, GenerateResult, PromptMessage, StreamPart},
    usage::Usage,
};
use crate::http::{body_stream, check_status};

pub const PROVIDER: &str = "openai-compat";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Provider that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatModel {
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatModel {
    pub fn new(settings: &Settings, api_base: Option<String>, api_key: impl Into<String>) -> Self {
        let base_url = api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    pub fn build_request_body(&self, prompt: &[PromptMessage], stream: bool) -> Value {
        let messages: Vec<Value> = prompt
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<gloo_net::http::Response> {
        let response = gloo_net::http::Request::post(&self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .json(body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response).await
    }
}

fn provider_error(context: &str, cause: impl std::fmt::Display) -> ChatError {
    ChatError::Backend(format!("{} {}: {}", PROVIDER, context, cause))
}

#[async_trait(?Send)]
impl LanguageModel for OpenAiCompatModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &[PromptMessage]) -> Result<GenerateResult> {
        let body = self.build_request_body(prompt, false);
        let response = self
            .post(&body)
            .await
            .map_err(|e| provider_error("error", e))?;
        let data: ApiResponse = response
            .json()
            .await
            .map_err(|e| provider_error("error", e))?;
        parse_completion(data)
    }

    fn stream(&self, prompt: &[PromptMessage]) -> PartStream<'_> {
        let body = self.build_request_body(prompt, true);

        let start = stream::once(async { StreamPart::StreamStart { warnings: Vec::new() } });
        let rest = stream::once(async move {
            let opened = match self.post(&body).await {
                Ok(response) => body_stream(response),
                Err(e) => Err(e),
            };
            match opened {
                Ok(bytes) => relay(bytes).left_stream(),
                Err(e) => stream::iter([StreamPart::Error {
                    error: provider_error("stream error", e),
                }])
                .right_stream(),
            }
        })
        .flatten();

        Box::pin(start.chain(rest))
    }
}

// ─── API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiChoice {
    pub message: ApiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            input_tokens: Some(u.prompt_tokens),
            output_tokens: Some(u.completion_tokens),
            total_tokens: Some(u.total_tokens),
        }
    }
}

/// One `data:` chunk of a streamed completion
#[derive(Debug, Deserialize)]
pub struct ApiStreamChunk {
    #[serde(default)]
    pub choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStreamChoice {
    #[serde(default)]
    pub delta: ApiDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiDelta {
    #[serde(default)]
    pub content: Option<String>,
}

pub fn parse_completion(data: ApiResponse) -> Result<GenerateResult> {
    let usage = data.usage.map(Usage::from).unwrap_or_default();
    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| provider_error("error", "no choices in response"))?;

    Ok(GenerateResult {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_provider)
            .unwrap_or(FinishReason::Stop),
        usage,
        warnings: Vec::new(),
    })
}

#[derive(Debug)]
pub enum StreamLine {
    Chunk(ApiStreamChunk),
    Done,
}

/// Decode one SSE line of a streamed completion. Anything else is skipped.
pub fn parse_stream_line(line: &[u8]) -> Option<StreamLine> {
    let line = std::str::from_utf8(line).ok()?;
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data == DONE_MARKER {
        return Some(StreamLine::Done);
    }
    match serde_json::from_str(data) {
        Ok(chunk) => Some(StreamLine::Chunk(chunk)),
        Err(e) => {
            log::debug!("Skipping undecodable completion chunk: {}", e);
            None
        }
    }
}

/// Accumulates stream state between body reads.
#[derive(Default)]
pub struct CompletionRelay {
    lines: LineSplitter,
    finish_reason: Option<FinishReason>,
    usage: Usage,
    done: bool,
}

impl CompletionRelay {
    /// Feed one body increment; returns the deltas it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamPart> {
        let lines = self.lines.push(bytes);
        let mut parts = Vec::new();
        for line in lines {
            if self.done {
                break;
            }
            self.apply(&line, &mut parts);
        }
        parts
    }

    /// Flush the tail and produce the terminal part.
    pub fn finish(&mut self) -> Vec<StreamPart> {
        let mut parts = Vec::new();
        if let Some(line) = self.lines.finish() {
            if !self.done {
                self.apply(&line, &mut parts);
            }
        }
        parts.push(StreamPart::Finish {
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Stop),
            usage: self.usage,
        });
        parts
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn apply(&mut self, line: &[u8], parts: &mut Vec<StreamPart>) {
        match parse_stream_line(line) {
            Some(StreamLine::Chunk(chunk)) => {
                if let Some(usage) = chunk.usage {
                    self.usage = usage.into();
                }
                for choice in chunk.choices {
                    if let Some(reason) = choice.finish_reason.as_deref() {
                        self.finish_reason = Some(FinishReason::from_provider(reason));
                    }
                    match choice.delta.content {
                        Some(delta) if !delta.is_empty() => parts.push(StreamPart::TextDelta {
                            id: generate_id(),
                            delta,
                        }),
                        _ => {}
                    }
                }
            }
            Some(StreamLine::Done) => self.done = true,
            None => {}
        }
    }
}

struct Relay {
    bytes: ByteStream<'static>,
    relay: CompletionRelay,
    pending: VecDeque<StreamPart>,
    finished: bool,
}

fn relay(bytes: ByteStream<'static>) -> PartStream<'static> {
    let state = Relay {
        bytes,
        relay: CompletionRelay::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(part) = state.pending.pop_front() {
                return Some((part, state));
            }
            if state.finished {
                return None;
            }
            let next = if state.relay.is_done() {
                None
            } else {
                state.bytes.next().await
            };
            match next {
                Some(Ok(bytes)) => {
                    let parts = state.relay.push(&bytes);
                    state.pending.extend(parts);
                }
                Some(Err(e)) => {
                    log::warn!("Completion stream failed: {}", e);
                    state.pending.push_back(StreamPart::Error {
                        error: provider_error("stream error", e),
                    });
                    state.finished = true;
                }
                None => {
                    let parts = state.relay.finish();
                    state.pending.extend(parts);
                    state.finished = true;
                }
            }
        }
    }))
}
