//! Remote agent invocation over HTTP.
//!
//! The agent-execution backend is reached through a proxy URL that accepts
//! the invocation request as JSON and relays the agent's completion bytes
//! as they are produced.

use async_trait::async_trait;

use chat_core::adapter::InvokeAgentRequest;
use chat_core::ports::{AgentInvoker, ByteStream};
use chat_types::Result;
use crate::http::{body_stream, check_status, post_json};

pub struct HttpAgentInvoker {
    url: String,
    app: String,
}

impl HttpAgentInvoker {
    pub fn new(url: impl Into<String>, app: impl Into<String>) -> Self {
        Self { url: url.into(), app: app.into() }
    }
}

#[async_trait(?Send)]
impl AgentInvoker for HttpAgentInvoker {
    async fn invoke<'a>(&'a self, request: InvokeAgentRequest) -> Result<ByteStream<'a>> {
        log::info!(
            "Invoking agent {} alias {} at {}",
            request.agent_id,
            request.agent_alias_id,
            self.url
        );
        let response = post_json(&self.url, &self.app, &request).await?;
        let response = check_status(response).await?;
        body_stream(response)
    }
}
