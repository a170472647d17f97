//! Composition root: resolves the configured store and backend into one
//! conversation session.

use std::rc::Rc;

use chat_core::endpoint::LocalChatEndpoint;
use chat_core::ports::{ChatTransport, ThreadStore};
use chat_core::ConversationSession;
use chat_platform::llm::ModelBackend;
use chat_platform::{FetchChatTransport, GlooTimer, HttpThreadStore, MemoryThreadStore};
use chat_types::config::{ChatConfig, StoreKind};
use chat_types::Result;

pub type Session = ConversationSession<Rc<dyn ThreadStore>, Rc<dyn ChatTransport>>;

/// Wire a session for `config`.
///
/// `Remote` talks to the envelope API and the chat-stream endpoint.
/// `Memory` keeps threads in the page and serves both send paths from the
/// configured model backend.
pub fn build_session(config: ChatConfig) -> Result<Session> {
    let (store, transport): (Rc<dyn ThreadStore>, Rc<dyn ChatTransport>) = match config.store {
        StoreKind::Remote => (
            Rc::new(HttpThreadStore::from_config(&config.endpoint)),
            Rc::new(FetchChatTransport::from_config(&config.endpoint)),
        ),
        StoreKind::Memory => {
            let model = Rc::new(ModelBackend::from_config(&config)?);
            let store: Rc<dyn ThreadStore> = Rc::new(MemoryThreadStore::new(model.clone()));
            let endpoint = LocalChatEndpoint::new(model).with_history(store.clone());
            (store, Rc::new(endpoint))
        }
    };

    Ok(ConversationSession::new(config, store, transport).with_timer(GlooTimer))
}
