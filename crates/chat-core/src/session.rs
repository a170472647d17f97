//! Conversation session: the per-user state machine over threads.
//!
//! One `ConversationSession` is built per user session and handed to every
//! surface that needs it. It owns the thread list, the active thread, the
//! per-thread phases and streaming buffers, and the usage ledger, and it
//! publishes every change on an [`EventBus`].
//!
//! All methods take `&self`; state lives behind a `RefCell` that is never
//! borrowed across an `.await`, so operations on different threads can run
//! concurrently on the single-threaded executor.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures::future::{self, AbortHandle, AbortRegistration, Abortable, Either};
use futures::StreamExt;

use chat_types::{
    ChatError, Result,
    api::SendMessageRequest,
    config::{ChatConfig, Settings, SettingsPatch, StreamUsagePolicy},
    event::{SessionEvent, ThreadPhase},
    message::{Message, MessageUsage},
    thread::{NewThread, Thread, ThreadUpdates},
    usage::{estimate_tokens, UsageLedger, UsageTotals},
};
use crate::event_bus::EventBus;
use crate::ports::{ChatTransport, ThreadStore, Timer};
use crate::transport::{TransportClient, TransportUpdate};

/// Page size used by `refresh_threads`
pub const DEFAULT_THREAD_LIMIT: usize = 50;

pub const LOAD_THREADS_FAILED: &str = "Failed to load chat history";
pub const CREATE_THREAD_FAILED: &str = "Failed to create new chat";
pub const DELETE_THREAD_FAILED: &str = "Failed to delete chat";
pub const LOAD_THREAD_FAILED: &str = "Failed to load chat";
pub const RENAME_THREAD_FAILED: &str = "Failed to rename chat";

#[derive(Default)]
struct SessionState {
    threads: Vec<Thread>,
    active: Option<Thread>,
    settings: Settings,
    ledger: UsageLedger,
    phases: HashMap<String, ThreadPhase>,
    in_flight: HashSet<String>,
    buffers: HashMap<String, String>,
    aborts: HashMap<String, AbortHandle>,
    /// Threads deleted while an operation on them was still running
    deleted: HashSet<String>,
    last_error: Option<String>,
    threads_error: Option<String>,
    loading_threads: bool,
}

impl SessionState {
    fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.id.as_str())
    }

    fn is_active(&self, thread_id: &str) -> bool {
        self.active_id() == Some(thread_id)
    }

    /// Mirror a thread's message list into the sidebar entry and the active
    /// thread, moving the entry to the top.
    fn store_messages(&mut self, thread_id: &str, messages: &[Message]) {
        if let Some(active) = self.active.as_mut().filter(|t| t.id == thread_id) {
            ThreadUpdates::messages(messages.to_vec()).apply_to(active);
        }
        if let Some(pos) = self.threads.iter().position(|t| t.id == thread_id) {
            let mut entry = self.threads.remove(pos);
            entry.message_count = messages.len();
            entry.touch();
            self.threads.insert(0, entry);
        }
    }

    fn replace_thread(&mut self, thread: Thread) {
        self.threads.retain(|t| t.id != thread.id);
        self.threads.insert(0, thread.clone());
        if self.is_active(&thread.id) {
            self.active = Some(thread);
        }
    }
}

/// Releases a thread's in-flight slot however the operation ends,
/// including when its future is dropped mid-await.
struct InFlight<'a> {
    state: &'a RefCell<SessionState>,
    bus: &'a EventBus,
    thread_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let previous = match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.in_flight.remove(&self.thread_id);
                state.aborts.remove(&self.thread_id);
                state.buffers.remove(&self.thread_id);
                state.deleted.remove(&self.thread_id);
                state.phases.insert(self.thread_id.clone(), ThreadPhase::Idle)
            }
            Err(_) => {
                log::error!("Session state busy while releasing thread {}", self.thread_id);
                return;
            }
        };
        if previous != Some(ThreadPhase::Idle) {
            self.bus.emit(SessionEvent::PhaseChanged {
                thread_id: self.thread_id.clone(),
                phase: ThreadPhase::Idle,
            });
        }
    }
}

pub struct ConversationSession<S, T> {
    config: ChatConfig,
    store: S,
    client: TransportClient<T>,
    bus: EventBus,
    timer: Option<Box<dyn Timer>>,
    state: RefCell<SessionState>,
}

impl<S: ThreadStore, T: ChatTransport> ConversationSession<S, T> {
    pub fn new(config: ChatConfig, store: S, transport: T) -> Self {
        let state = SessionState {
            settings: config.settings.clone(),
            ledger: UsageLedger::new(config.usage.limit, config.usage.period.clone()),
            ..SessionState::default()
        };
        log::info!(
            "Chat session ready (store: {}, backend: {})",
            store.backend_name(),
            config.backend.label()
        );
        Self {
            config,
            store,
            client: TransportClient::new(transport),
            bus: EventBus::new(),
            timer: None,
            state: RefCell::new(state),
        }
    }

    /// Publish on an existing bus instead of a private one.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Enables `stream_timeout_ms`. Without a timer streams are unbounded.
    pub fn with_timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Some(Box::new(timer));
        self
    }

    // ─── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        self.client.transport()
    }

    pub fn threads(&self) -> Vec<Thread> {
        self.state.borrow().threads.clone()
    }

    pub fn active_thread(&self) -> Option<Thread> {
        self.state.borrow().active.clone()
    }

    pub fn active_thread_id(&self) -> Option<String> {
        self.state.borrow().active_id().map(str::to_string)
    }

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    pub fn ledger(&self) -> UsageLedger {
        self.state.borrow().ledger.clone()
    }

    pub fn phase(&self, thread_id: &str) -> ThreadPhase {
        self.state
            .borrow()
            .phases
            .get(thread_id)
            .copied()
            .unwrap_or(ThreadPhase::Idle)
    }

    pub fn is_in_flight(&self, thread_id: &str) -> bool {
        self.state.borrow().in_flight.contains(thread_id)
    }

    /// Partial reply of the active thread, if it is streaming.
    pub fn visible_buffer(&self) -> Option<String> {
        let state = self.state.borrow();
        let id = state.active_id()?;
        state.buffers.get(id).cloned()
    }

    pub fn buffer(&self, thread_id: &str) -> Option<String> {
        self.state.borrow().buffers.get(thread_id).cloned()
    }

    /// Inline error indicator for the last failed operation
    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn threads_error(&self) -> Option<String> {
        self.state.borrow().threads_error.clone()
    }

    pub fn is_loading_threads(&self) -> bool {
        self.state.borrow().loading_threads
    }

    pub fn clear_error(&self) {
        self.state.borrow_mut().last_error = None;
    }

    // ─── Thread Actions ──────────────────────────────────────

    pub async fn load_threads(&self, limit: usize) -> Result<usize> {
        {
            let mut state = self.state.borrow_mut();
            state.loading_threads = true;
            state.threads_error = None;
        }

        let result = self.store.get_threads(limit).await;

        let mut state = self.state.borrow_mut();
        state.loading_threads = false;
        match result {
            Ok(threads) => {
                let count = threads.len();
                state.threads = threads;
                drop(state);
                log::debug!("Loaded {} threads", count);
                self.bus.emit(SessionEvent::ThreadsLoaded { count });
                Ok(count)
            }
            Err(e) => {
                state.threads_error = Some(LOAD_THREADS_FAILED.to_string());
                drop(state);
                log::error!("{}: {}", LOAD_THREADS_FAILED, e);
                self.emit_error(None, LOAD_THREADS_FAILED);
                Err(e)
            }
        }
    }

    pub async fn refresh_threads(&self) -> Result<usize> {
        self.load_threads(DEFAULT_THREAD_LIMIT).await
    }

    /// Create a thread from the current defaults and make it active.
    pub async fn create_thread(&self, title: Option<&str>) -> Result<Thread> {
        self.clear_error();
        let request = NewThread::from_settings(title, &self.settings());

        let thread = match self.store.create_thread(request).await {
            Ok(thread) => thread,
            Err(e) => {
                log::error!("{}: {}", CREATE_THREAD_FAILED, e);
                self.fail(None, CREATE_THREAD_FAILED);
                return Err(e);
            }
        };

        {
            let mut state = self.state.borrow_mut();
            state.threads.retain(|t| t.id != thread.id);
            state.threads.insert(0, thread.clone());
            state.active = Some(thread.clone());
        }
        self.bus.emit(SessionEvent::ThreadCreated { thread_id: thread.id.clone() });
        self.bus.emit(SessionEvent::ThreadSelected { thread_id: thread.id.clone() });
        Ok(thread)
    }

    /// Create a thread and stream a first message into it.
    pub async fn start_thread(&self, title: Option<&str>, initial_message: &str) -> Result<Message> {
        let thread = self.create_thread(title).await?;
        self.stream_to(&thread.id, initial_message).await
    }

    pub async fn select_thread(&self, thread_id: &str) -> Result<Thread> {
        self.clear_error();
        match self.store.get_thread(thread_id).await {
            Ok(thread) => {
                {
                    let mut state = self.state.borrow_mut();
                    if let Some(entry) = state.threads.iter_mut().find(|t| t.id == thread.id) {
                        *entry = thread.clone();
                    }
                    state.active = Some(thread.clone());
                }
                self.bus.emit(SessionEvent::ThreadSelected { thread_id: thread.id.clone() });
                Ok(thread)
            }
            Err(e) => {
                log::error!("{} {}: {}", LOAD_THREAD_FAILED, thread_id, e);
                self.fail(Some(thread_id), LOAD_THREAD_FAILED);
                Err(e)
            }
        }
    }

    /// Delete a thread. Deleting the active thread leaves no thread active;
    /// an in-flight operation on it is aborted.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.clear_error();
        if let Err(e) = self.store.delete_thread(thread_id).await {
            log::error!("{} {}: {}", DELETE_THREAD_FAILED, thread_id, e);
            self.fail(Some(thread_id), DELETE_THREAD_FAILED);
            return Err(e);
        }

        let was_active = {
            let mut state = self.state.borrow_mut();
            state.threads.retain(|t| t.id != thread_id);
            if let Some(handle) = state.aborts.get(thread_id).cloned() {
                state.deleted.insert(thread_id.to_string());
                handle.abort();
            }
            let was_active = state.is_active(thread_id);
            if was_active {
                state.active = None;
            }
            was_active
        };

        self.bus.emit(SessionEvent::ThreadDeleted { thread_id: thread_id.to_string() });
        if was_active {
            self.bus.emit(SessionEvent::ThreadCleared);
        }
        Ok(())
    }

    pub async fn update_thread_title(&self, thread_id: &str, title: &str) -> Result<()> {
        self.clear_error();
        if let Err(e) = self
            .store
            .update_thread(thread_id, ThreadUpdates::title(title))
            .await
        {
            log::error!("{} {}: {}", RENAME_THREAD_FAILED, thread_id, e);
            self.fail(Some(thread_id), RENAME_THREAD_FAILED);
            return Err(e);
        }

        {
            let mut state = self.state.borrow_mut();
            if let Some(entry) = state.threads.iter_mut().find(|t| t.id == thread_id) {
                entry.title = title.to_string();
                entry.touch();
            }
            if let Some(active) = state.active.as_mut().filter(|t| t.id == thread_id) {
                active.title = title.to_string();
                active.touch();
            }
        }
        self.bus.emit(SessionEvent::ThreadRenamed {
            thread_id: thread_id.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Leave no thread active. The next send creates a new one.
    pub fn clear_current_thread(&self) {
        self.state.borrow_mut().active = None;
        self.bus.emit(SessionEvent::ThreadCleared);
    }

    /// Change the defaults for new threads. Existing threads keep their
    /// snapshot. Persisting the defaults is best-effort.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Settings {
        let settings = {
            let mut state = self.state.borrow_mut();
            state.settings.apply(patch);
            state.settings.clone()
        };
        if let Err(e) = self.store.update_settings(&settings).await {
            log::warn!("Failed to persist settings: {}", e);
        }
        settings
    }

    // ─── Usage ───────────────────────────────────────────────

    /// Pull authoritative usage for a period. `Ok(None)` leaves the ledger
    /// as it is.
    pub async fn load_token_usage(&self, period: &str) -> Result<Option<UsageTotals>> {
        let usage = match self.store.get_token_usage(period).await {
            Ok(usage) => usage,
            Err(e) => {
                log::warn!("Failed to load token usage: {}", e);
                return Err(e);
            }
        };

        if let Some(totals) = usage {
            let ledger = {
                let mut state = self.state.borrow_mut();
                state.ledger.sync(totals);
                state.ledger.period = period.to_string();
                state.ledger.clone()
            };
            self.bus.emit(SessionEvent::UsageUpdated { ledger });
        } else {
            log::debug!("Token usage unavailable for period {}", period);
        }
        Ok(usage)
    }

    pub fn reset_usage(&self) {
        let ledger = {
            let mut state = self.state.borrow_mut();
            state.ledger.reset();
            state.ledger.clone()
        };
        self.bus.emit(SessionEvent::UsageUpdated { ledger });
    }

    // ─── Messaging ───────────────────────────────────────────

    /// Non-streaming exchange on the active thread, creating one first if
    /// none is active.
    pub async fn send_message(&self, content: &str) -> Result<Message> {
        let thread_id = self.resolve_thread().await?;
        self.clear_error();

        let (guard, registration) = self.begin(&thread_id, ThreadPhase::Sending)?;
        let (_, settings) = self.append_user_message(&thread_id, content);

        let request = SendMessageRequest {
            thread_id: thread_id.clone(),
            message: content.to_string(),
            settings,
        };
        let outcome = self.bounded(self.store.send_message(request), registration).await;

        match outcome {
            Ok(response) => {
                let reply = response.message.clone();
                let ledger = {
                    let mut state = self.state.borrow_mut();
                    state.replace_thread(response.thread);
                    state.ledger.record(&response.token_usage);
                    state.ledger.clone()
                };
                self.bus.emit(SessionEvent::MessageAppended {
                    thread_id: thread_id.clone(),
                    message_id: reply.id.clone(),
                    role: reply.role,
                });
                self.bus.emit(SessionEvent::UsageUpdated { ledger });
                drop(guard);
                Ok(reply)
            }
            Err(e) => {
                if !self.was_deleted(&thread_id) {
                    self.fault(&thread_id, &e);
                }
                drop(guard);
                Err(e)
            }
        }
    }

    /// Streamed exchange on the active thread, creating one first if none is
    /// active. Resolves with the assistant message once the reply is
    /// complete and persisted.
    pub async fn stream_message(&self, content: &str) -> Result<Message> {
        let thread_id = self.resolve_thread().await?;
        self.stream_to(&thread_id, content).await
    }

    /// Abort the in-flight operation on a thread. Returns false when there
    /// was none.
    pub fn stop_streaming(&self, thread_id: &str) -> bool {
        match self.state.borrow().aborts.get(thread_id) {
            Some(handle) => {
                log::info!("Stopping stream on thread {}", thread_id);
                handle.abort();
                true
            }
            None => false,
        }
    }

    async fn resolve_thread(&self) -> Result<String> {
        if let Some(id) = self.active_thread_id() {
            return Ok(id);
        }
        log::debug!("No active thread; creating one");
        Ok(self.create_thread(None).await?.id)
    }

    async fn stream_to(&self, thread_id: &str, content: &str) -> Result<Message> {
        self.clear_error();

        let (guard, registration) = self.begin(thread_id, ThreadPhase::Streaming)?;
        self.state
            .borrow_mut()
            .buffers
            .insert(thread_id.to_string(), String::new());
        let (mut messages, settings) = self.append_user_message(thread_id, content);

        let request = SendMessageRequest {
            thread_id: thread_id.to_string(),
            message: content.to_string(),
            settings,
        };
        let outcome = self.bounded(self.read_stream(&request), registration).await;

        let text = match outcome {
            Ok(text) => text,
            Err(e) if self.was_deleted(thread_id) => {
                log::debug!("Thread {} deleted mid-stream: {}", thread_id, e);
                drop(guard);
                return Err(e);
            }
            Err(e) => {
                self.fault(thread_id, &e);
                // the user message is kept; retry is sending again
                let updates = ThreadUpdates::messages(messages);
                if let Err(persist) = self.store.update_thread(thread_id, updates).await {
                    log::warn!("Failed to save thread {} after fault: {}", thread_id, persist);
                }
                drop(guard);
                return Err(e);
            }
        };

        let mut reply = Message::assistant(thread_id, text);
        if self.config.usage.stream_usage == StreamUsagePolicy::Estimate {
            let output = estimate_tokens(&reply.content);
            reply = reply.with_usage(MessageUsage {
                input: estimate_tokens(content),
                output,
                estimated: true,
            });
        }
        messages.push(reply.clone());

        let ledger = {
            let mut state = self.state.borrow_mut();
            state.buffers.remove(thread_id);
            state.store_messages(thread_id, &messages);
            match reply.token_usage {
                Some(usage) => {
                    state.ledger.record(&UsageTotals::from(usage));
                    Some(state.ledger.clone())
                }
                None => None,
            }
        };
        self.bus.emit(SessionEvent::MessageAppended {
            thread_id: thread_id.to_string(),
            message_id: reply.id.clone(),
            role: reply.role,
        });
        self.bus.emit(SessionEvent::StreamFinished {
            thread_id: thread_id.to_string(),
            message_id: reply.id.clone(),
        });
        if let Some(ledger) = ledger {
            self.bus.emit(SessionEvent::UsageUpdated { ledger });
        }

        let persisted = self.persist(thread_id, messages).await;
        drop(guard);
        persisted.map(|_| reply)
    }

    /// Mirror every cumulative update into the thread's buffer and return
    /// the final text.
    async fn read_stream(&self, request: &SendMessageRequest) -> Result<String> {
        let mut updates = self.client.stream_message(request).await?;
        while let Some(update) = updates.next().await {
            match update? {
                TransportUpdate::Text(text) => {
                    self.state
                        .borrow_mut()
                        .buffers
                        .insert(request.thread_id.clone(), text.clone());
                    self.bus.emit(SessionEvent::StreamUpdated {
                        thread_id: request.thread_id.clone(),
                        text,
                    });
                }
                TransportUpdate::Done(text) => return Ok(text),
            }
        }
        Err(ChatError::Cancelled)
    }

    /// Claim the thread's in-flight slot. Rejects before any side effect if
    /// an operation is already running on it.
    fn begin(&self, thread_id: &str, phase: ThreadPhase) -> Result<(InFlight<'_>, AbortRegistration)> {
        let registration = {
            let mut state = self.state.borrow_mut();
            if state.in_flight.contains(thread_id) {
                log::warn!("Rejecting second operation on thread {}", thread_id);
                return Err(ChatError::StreamInProgress {
                    thread_id: thread_id.to_string(),
                });
            }
            let (handle, registration) = AbortHandle::new_pair();
            state.in_flight.insert(thread_id.to_string());
            state.aborts.insert(thread_id.to_string(), handle);
            state.phases.insert(thread_id.to_string(), phase);
            registration
        };
        self.bus.emit(SessionEvent::PhaseChanged {
            thread_id: thread_id.to_string(),
            phase,
        });
        let guard = InFlight {
            state: &self.state,
            bus: &self.bus,
            thread_id: thread_id.to_string(),
        };
        Ok((guard, registration))
    }

    /// Optimistically append the user message. Returns the thread's message
    /// list including it, and the settings snapshot to send with it.
    fn append_user_message(&self, thread_id: &str, content: &str) -> (Vec<Message>, Settings) {
        let message = Message::user(thread_id, content);
        let (messages, settings) = {
            let mut state = self.state.borrow_mut();
            let fallback = state.settings.clone();
            match state.active.as_mut().filter(|t| t.id == thread_id) {
                Some(thread) => {
                    thread.push_message(message.clone());
                    (thread.messages.clone(), thread.settings.clone())
                }
                None => (vec![message.clone()], fallback),
            }
        };
        self.bus.emit(SessionEvent::MessageAppended {
            thread_id: thread_id.to_string(),
            message_id: message.id,
            role: message.role,
        });
        (messages, settings)
    }

    /// Apply cancellation and the configured timeout to one operation.
    async fn bounded<F, R>(&self, operation: F, registration: AbortRegistration) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        let abortable = async move {
            match Abortable::new(operation, registration).await {
                Ok(result) => result,
                Err(_aborted) => Err(ChatError::Cancelled),
            }
        };

        match (&self.timer, self.config.stream_timeout_ms) {
            (Some(timer), Some(ms)) => {
                let sleep = timer.sleep(ms);
                futures::pin_mut!(abortable);
                match future::select(abortable, sleep).await {
                    Either::Left((result, _)) => result,
                    Either::Right(((), _)) => Err(ChatError::Timeout(ms)),
                }
            }
            _ => abortable.await,
        }
    }

    async fn persist(&self, thread_id: &str, messages: Vec<Message>) -> Result<()> {
        let result = self
            .store
            .update_thread(thread_id, ThreadUpdates::messages(messages))
            .await;
        if let Err(e) = &result {
            log::error!("Failed to save thread {}: {}", thread_id, e);
            self.fail(Some(thread_id), &e.to_string());
        }
        result
    }

    fn was_deleted(&self, thread_id: &str) -> bool {
        self.state.borrow().deleted.contains(thread_id)
    }

    /// Fault path of a send or stream: the buffer goes, the messages stay.
    fn fault(&self, thread_id: &str, error: &ChatError) {
        log::warn!("Operation on thread {} failed: {}", thread_id, error);
        {
            let mut state = self.state.borrow_mut();
            state.buffers.remove(thread_id);
            state.phases.insert(thread_id.to_string(), ThreadPhase::Error);
        }
        self.bus.emit(SessionEvent::PhaseChanged {
            thread_id: thread_id.to_string(),
            phase: ThreadPhase::Error,
        });
        self.fail(Some(thread_id), &error.to_string());
    }

    fn fail(&self, thread_id: Option<&str>, message: &str) {
        self.state.borrow_mut().last_error = Some(message.to_string());
        self.emit_error(thread_id, message);
    }

    fn emit_error(&self, thread_id: Option<&str>, message: &str) {
        self.bus.emit(SessionEvent::Error {
            thread_id: thread_id.map(str::to_string),
            message: message.to_string(),
        });
    }
}
