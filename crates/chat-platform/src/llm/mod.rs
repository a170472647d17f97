//! Model backends, as a closed set resolved once from configuration.

pub mod openai_compat;

use async_trait::async_trait;

use chat_core::adapter::{RemoteAgentModel, RemoteAgentSettings};
use chat_core::ports::{LanguageModel, PartStream};
use chat_types::{
    ChatError, Result,
    config::{BackendConfig, ChatConfig},
    stream::{GenerateResult, PromptMessage},
};
use crate::invoker::HttpAgentInvoker;

pub use openai_compat::OpenAiCompatModel;

pub enum ModelBackend {
    RemoteAgent(RemoteAgentModel<HttpAgentInvoker>),
    OpenAiCompat(OpenAiCompatModel),
}

impl ModelBackend {
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let backend = match &config.backend {
            BackendConfig::RemoteAgent {
                agent_id,
                agent_alias_id,
                session_id,
                invoke_url,
            } => {
                if agent_id.is_empty() {
                    return Err(ChatError::Config("backend.agentId is empty".to_string()));
                }
                if invoke_url.is_empty() {
                    return Err(ChatError::Config("backend.invokeUrl is empty".to_string()));
                }
                let settings = RemoteAgentSettings {
                    agent_id: Some(agent_id.clone()),
                    agent_alias_id: agent_alias_id.clone(),
                    session_id: session_id.clone(),
                };
                let invoker = HttpAgentInvoker::new(invoke_url.clone(), config.endpoint.app.clone());
                ModelBackend::RemoteAgent(RemoteAgentModel::new(
                    config.settings.model.clone(),
                    settings,
                    invoker,
                ))
            }
            BackendConfig::OpenAiCompat { api_base, api_key } => {
                if api_key.is_empty() {
                    log::warn!("No API key configured; relying on the endpoint to authorize");
                }
                ModelBackend::OpenAiCompat(OpenAiCompatModel::new(
                    &config.settings,
                    api_base.clone(),
                    api_key.clone(),
                ))
            }
        };
        log::info!(
            "Model backend: {} ({})",
            backend.provider(),
            backend.model_id()
        );
        Ok(backend)
    }
}

#[async_trait(?Send)]
impl LanguageModel for ModelBackend {
    fn provider(&self) -> &str {
        match self {
            ModelBackend::RemoteAgent(m) => m.provider(),
            ModelBackend::OpenAiCompat(m) => m.provider(),
        }
    }

    fn model_id(&self) -> &str {
        match self {
            ModelBackend::RemoteAgent(m) => m.model_id(),
            ModelBackend::OpenAiCompat(m) => m.model_id(),
        }
    }

    async fn generate(&self, prompt: &[PromptMessage]) -> Result<GenerateResult> {
        match self {
            ModelBackend::RemoteAgent(m) => m.generate(prompt).await,
            ModelBackend::OpenAiCompat(m) => m.generate(prompt).await,
        }
    }

    fn stream(&self, prompt: &[PromptMessage]) -> PartStream<'_> {
        match self {
            ModelBackend::RemoteAgent(m) => m.stream(prompt),
            ModelBackend::OpenAiCompat(m) => m.stream(prompt),
        }
    }
}
