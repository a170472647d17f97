//! Chat-stream transport over browser `fetch`.

use async_trait::async_trait;

use chat_core::ports::{ByteStream, ChatTransport};
use chat_types::{Result, api::ServiceRequest, config::EndpointConfig};
use crate::http::{body_stream, check_status, post_json};

/// POSTs `streamMessage` requests to the chat-stream endpoint and hands back
/// the event-stream body unbuffered.
pub struct FetchChatTransport {
    url: String,
    app: String,
}

impl FetchChatTransport {
    pub fn new(url: impl Into<String>, app: impl Into<String>) -> Self {
        Self { url: url.into(), app: app.into() }
    }

    pub fn from_config(endpoint: &EndpointConfig) -> Self {
        Self::new(endpoint.stream_url.clone(), endpoint.app.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait(?Send)]
impl ChatTransport for FetchChatTransport {
    async fn open<'a>(&'a self, request: &ServiceRequest) -> Result<ByteStream<'a>> {
        log::debug!("Opening {} stream at {}", request.operation, self.url);
        let response = post_json(&self.url, &self.app, request).await?;
        let response = check_status(response).await?;
        body_stream(response)
    }
}
