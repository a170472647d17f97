pub mod ports;
pub mod chunk;
pub mod adapter;
pub mod sse;
pub mod transport;
pub mod endpoint;
pub mod event_bus;
pub mod session;


pub use session::ConversationSession;
