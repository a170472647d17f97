//! Event bus between the conversation session and whatever renders it.
//!
//! Single-threaded (WASM constraint) with interior mutability via RefCell.
//! Events are buffered for polling consumers, and also fanned out to any
//! channel subscribers so async consumers can await them. The polling
//! queue is bounded: once full, the oldest event is dropped, so a consumer
//! that only subscribes never has to drain.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use futures::channel::mpsc;
use chat_types::event::SessionEvent;

/// Events kept for `drain` between polls
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct BusInner {
    queue: VecDeque<SessionEvent>,
    capacity: usize,
    dropped: u64,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl Default for BusInner {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            dropped: 0,
            subscribers: Vec::new(),
        }
    }
}

/// Shared event bus, clone-cheap via Rc.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose polling queue holds at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let inner = BusInner {
            capacity: capacity.max(1),
            ..BusInner::default()
        };
        Self { inner: Rc::new(RefCell::new(inner)) }
    }

    /// Publish an event.
    pub fn emit(&self, event: SessionEvent) {
        let mut inner = self.inner.borrow_mut();
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
        if inner.queue.len() >= inner.capacity {
            inner.queue.pop_front();
            if inner.dropped == 0 {
                log::warn!("Event queue full ({} events); dropping oldest", inner.capacity);
            }
            inner.dropped += 1;
        }
        inner.queue.push_back(event);
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut inner = self.inner.borrow_mut();
        if inner.dropped > 0 {
            log::debug!("{} events dropped since the last drain", inner.dropped);
            inner.dropped = 0;
        }
        inner.queue.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().queue.is_empty()
    }

    /// Receive every event emitted from now on. Dropped receivers are
    /// pruned on the next emit.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.borrow_mut().subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}
