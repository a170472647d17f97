//! Local chat-stream endpoint.
//!
//! Serves `streamMessage` requests straight from a [`LanguageModel`],
//! encoding its lifecycle parts as `data: ` lines. It implements
//! [`ChatTransport`] itself, so a session can run against a model in-process
//! with the same wire format the HTTP endpoint produces.

use std::rc::Rc;

use async_trait::async_trait;
use futures::future;
use futures::StreamExt;

use chat_types::{
    ChatError, Result,
    api::{operation, SendMessageRequest, ServiceRequest, AGENT_SERVICE},
    message::Role,
    stream::{PromptMessage, StreamPart, StreamPayload},
};
use crate::ports::{ByteStream, ChatTransport, LanguageModel, ThreadStore};
use crate::sse::{encode_done, encode_payload};

pub struct LocalChatEndpoint<M> {
    model: M,
    history: Option<Rc<dyn ThreadStore>>,
}

impl<M: LanguageModel> LocalChatEndpoint<M> {
    pub fn new(model: M) -> Self {
        Self { model, history: None }
    }

    /// Prepend the thread's stored messages to every prompt.
    pub fn with_history(mut self, store: Rc<dyn ThreadStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// System instruction, stored history, then the new user turn.
    pub async fn build_prompt(&self, request: &SendMessageRequest) -> Vec<PromptMessage> {
        let mut prompt = Vec::new();
        if !request.settings.system_prompt.is_empty() {
            prompt.push(PromptMessage::new(Role::System, request.settings.system_prompt.clone()));
        }

        if let Some(store) = &self.history {
            match store.get_thread(&request.thread_id).await {
                Ok(thread) => prompt.extend(
                    thread
                        .messages
                        .iter()
                        .filter(|m| m.role != Role::System)
                        .map(PromptMessage::from),
                ),
                Err(e) => log::debug!("No history for thread {}: {}", request.thread_id, e),
            }
        }

        prompt.push(PromptMessage::user(request.message.clone()));
        prompt
    }
}

/// Wire form of one part. `StreamStart` has none.
pub fn encode_part(part: StreamPart) -> Option<Result<Vec<u8>>> {
    let line = match part {
        StreamPart::StreamStart { warnings } => {
            for warning in warnings {
                log::debug!("Model warning: {}", warning.message);
            }
            return None;
        }
        StreamPart::TextDelta { delta, .. } => encode_payload(&StreamPayload::content(delta)),
        StreamPart::Finish { finish_reason, .. } => {
            log::debug!("Stream finished: {:?}", finish_reason);
            Ok(encode_done())
        }
        StreamPart::Error { error } => {
            log::warn!("Stream failed: {}", error);
            encode_payload(&StreamPayload::error(error.to_string()))
        }
    };
    Some(line.map(String::into_bytes))
}

fn bad_request(message: String) -> ChatError {
    ChatError::Http { status: 400, body: message }
}

#[async_trait(?Send)]
impl<M: LanguageModel> ChatTransport for LocalChatEndpoint<M> {
    async fn open<'a>(&'a self, request: &ServiceRequest) -> Result<ByteStream<'a>> {
        if request.service != AGENT_SERVICE || request.operation != operation::STREAM_MESSAGE {
            return Err(bad_request(format!(
                "unsupported operation {}.{}",
                request.service, request.operation
            )));
        }
        let body: SendMessageRequest = request
            .data_as()
            .map_err(|e| bad_request(e.to_string()))?;

        let prompt = self.build_prompt(&body).await;
        log::debug!(
            "Streaming {} turn(s) to {}/{}",
            prompt.len(),
            self.model.provider(),
            self.model.model_id()
        );

        let parts = self.model.stream(&prompt);
        Ok(Box::pin(parts.filter_map(|part| future::ready(encode_part(part)))))
    }
}
