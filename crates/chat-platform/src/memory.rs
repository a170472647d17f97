//! In-memory thread store.
//! Fastest option but not persistent across page reloads. Non-streaming
//! sends are answered by the configured model directly.

use std::cell::RefCell;
use std::collections::HashMap;
use async_trait::async_trait;

use chat_core::ports::{LanguageModel, ThreadStore};
use chat_types::{
    ChatError, Result,
    api::{SendMessageRequest, SendMessageResponse},
    config::Settings,
    message::{Message, MessageUsage, Role},
    stream::PromptMessage,
    thread::{NewThread, Thread, ThreadUpdates},
    usage::{estimate_tokens, Usage, UsageTotals},
};

pub struct MemoryThreadStore<M> {
    threads: RefCell<HashMap<String, Thread>>,
    settings: RefCell<Option<Settings>>,
    model: M,
}

impl<M: LanguageModel> MemoryThreadStore<M> {
    pub fn new(model: M) -> Self {
        Self {
            threads: RefCell::new(HashMap::new()),
            settings: RefCell::new(None),
            model,
        }
    }

    pub fn len(&self) -> usize {
        self.threads.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.borrow().is_empty()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Defaults last saved through `update_settings`
    pub fn saved_settings(&self) -> Option<Settings> {
        self.settings.borrow().clone()
    }

    fn find(&self, thread_id: &str) -> Result<Thread> {
        self.threads
            .borrow()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| ChatError::ThreadNotFound(thread_id.to_string()))
    }
}

/// Thread totals as the sum of its messages' usage
fn message_totals(messages: &[Message]) -> UsageTotals {
    let mut totals = UsageTotals::default();
    for usage in messages.iter().filter_map(|m| m.token_usage) {
        totals.add(&UsageTotals::from(usage));
    }
    totals
}

/// Usage of one exchange: the model's figures when it reports them,
/// otherwise a length-based estimate.
fn exchange_usage(reported: Usage, input: &str, output: &str) -> MessageUsage {
    match (reported.input_tokens, reported.output_tokens) {
        (Some(input), Some(output)) => MessageUsage { input, output, estimated: false },
        _ => MessageUsage {
            input: estimate_tokens(input),
            output: estimate_tokens(output),
            estimated: true,
        },
    }
}

#[async_trait(?Send)]
impl<M: LanguageModel> ThreadStore for MemoryThreadStore<M> {
    async fn get_threads(&self, limit: usize) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.threads.borrow().values().cloned().collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        threads.truncate(limit);
        Ok(threads)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.find(thread_id)
    }

    async fn create_thread(&self, request: NewThread) -> Result<Thread> {
        let thread = Thread::new(request.title, request.settings);
        self.threads
            .borrow_mut()
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn update_thread(&self, thread_id: &str, updates: ThreadUpdates) -> Result<()> {
        let mut threads = self.threads.borrow_mut();
        let thread = threads
            .get_mut(thread_id)
            .ok_or_else(|| ChatError::ThreadNotFound(thread_id.to_string()))?;
        updates.apply_to(thread);
        if updates.messages.is_some() {
            thread.token_usage = message_totals(&thread.messages);
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.threads
            .borrow_mut()
            .remove(thread_id)
            .map(|_| ())
            .ok_or_else(|| ChatError::ThreadNotFound(thread_id.to_string()))
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResponse> {
        let mut thread = self.find(&request.thread_id)?;

        let mut prompt = Vec::new();
        if !request.settings.system_prompt.is_empty() {
            prompt.push(PromptMessage::new(Role::System, request.settings.system_prompt.clone()));
        }
        prompt.extend(
            thread
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(PromptMessage::from),
        );
        prompt.push(PromptMessage::user(request.message.clone()));

        let result = self.model.generate(&prompt).await?;
        for warning in &result.warnings {
            log::debug!("Model warning: {}", warning.message);
        }

        let usage = exchange_usage(result.usage, &request.message, &result.content);
        let reply = Message::assistant(&thread.id, result.content).with_usage(usage);
        thread.push_message(Message::user(&thread.id, request.message));
        thread.push_message(reply.clone());
        let totals = UsageTotals::from(usage);
        thread.token_usage.add(&totals);

        self.threads
            .borrow_mut()
            .insert(thread.id.clone(), thread.clone());

        Ok(SendMessageResponse {
            thread,
            message: reply,
            token_usage: totals,
        })
    }

    async fn get_token_usage(&self, _period: &str) -> Result<Option<UsageTotals>> {
        // only this page's threads exist, so every period is the same
        let mut totals = UsageTotals::default();
        for thread in self.threads.borrow().values() {
            totals.add(&thread.token_usage);
        }
        Ok(Some(totals))
    }

    async fn update_settings(&self, settings: &Settings) -> Result<()> {
        *self.settings.borrow_mut() = Some(settings.clone());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
