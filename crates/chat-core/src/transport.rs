//! Transport client: the UI side of the chat-stream endpoint.
//!
//! Posts one `streamMessage` request through a [`ChatTransport`], reads the
//! event-stream body increment by increment, and turns it into a stream of
//! cumulative text snapshots. The body is never buffered to completion
//! before the first snapshot is produced.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use chat_types::{
    ChatError, Result,
    api::{operation, SendMessageRequest, ServiceRequest},
};
use crate::ports::{ByteStream, ChatTransport};
use crate::sse::{parse_line, LineSplitter, SseEvent};

/// One step of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportUpdate {
    /// Accumulated text so far
    Text(String),
    /// The body ended; the final accumulated text
    Done(String),
}

/// Successful streams end with exactly one `Done`; faulted streams end with
/// one `Err`.
pub type UpdateStream<'a> = Pin<Box<dyn Stream<Item = Result<TransportUpdate>> + 'a>>;

pub struct TransportClient<T> {
    transport: T,
}

impl<T: ChatTransport> TransportClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open a stream for one user message.
    pub async fn stream_message(&self, request: &SendMessageRequest) -> Result<UpdateStream<'_>> {
        let body = ServiceRequest::agent(operation::STREAM_MESSAGE, request)?;
        let bytes = self.transport.open(&body).await?;
        Ok(accumulate(bytes))
    }

    /// Run a stream to completion and return the final text.
    pub async fn complete_message(&self, request: &SendMessageRequest) -> Result<String> {
        let mut updates = self.stream_message(request).await?;
        let mut last = String::new();
        while let Some(update) = updates.next().await {
            match update? {
                TransportUpdate::Text(text) => last = text,
                TransportUpdate::Done(text) => return Ok(text),
            }
        }
        Ok(last)
    }
}

struct Accumulator<'a> {
    body: ByteStream<'a>,
    lines: LineSplitter,
    text: String,
    pending: VecDeque<Result<TransportUpdate>>,
    finished: bool,
}

impl Accumulator<'_> {
    /// Returns false once the line ended the stream.
    fn apply(&mut self, line: &[u8]) -> bool {
        match parse_line(line) {
            Some(SseEvent::Payload(payload)) => {
                if let Some(message) = payload.error {
                    self.pending.push_back(Err(ChatError::Backend(message)));
                    return false;
                }
                if let Some(content) = payload.content {
                    if !content.is_empty() {
                        self.text.push_str(&content);
                        self.pending.push_back(Ok(TransportUpdate::Text(self.text.clone())));
                    }
                }
                true
            }
            Some(SseEvent::Done) => {
                self.complete();
                false
            }
            None => true,
        }
    }

    fn complete(&mut self) {
        self.pending
            .push_back(Ok(TransportUpdate::Done(std::mem::take(&mut self.text))));
    }
}

/// Decode an event-stream body into cumulative text snapshots.
pub fn accumulate(body: ByteStream<'_>) -> UpdateStream<'_> {
    let state = Accumulator {
        body,
        lines: LineSplitter::new(),
        text: String::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(update) = state.pending.pop_front() {
                return Some((update, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(&bytes) {
                        if !state.apply(&line) {
                            state.finished = true;
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    log::warn!("Chat stream read failed: {}", e);
                    state.pending.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    let ended = match state.lines.finish() {
                        Some(line) => !state.apply(&line),
                        None => false,
                    };
                    if !ended {
                        state.complete();
                    }
                    state.finished = true;
                }
            }
        }
    }))
}
