pub mod message;
pub mod thread;
pub mod config;
pub mod usage;
pub mod stream;
pub mod event;
pub mod api;
pub mod error;

#[cfg(test)]
mod tests;

pub use error::ChatError;
pub type Result<T> = std::result::Result<T, ChatError>;
