//! Browser adapters for the chat core: `fetch`-backed transport, store and
//! agent invoker, the model backends, an in-page thread store and a
//! `setTimeout` timer.

pub mod http;
pub mod transport;
pub mod store;
pub mod invoker;
pub mod llm;
pub mod memory;
pub mod timer;


pub use memory::MemoryThreadStore;
pub use store::HttpThreadStore;
pub use transport::FetchChatTransport;
pub use timer::GlooTimer;
