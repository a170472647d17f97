use serde::{Deserialize, Serialize};

/// Top-level configuration for one chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatConfig {
    /// Defaults snapshotted into every new thread
    pub settings: Settings,
    pub backend: BackendConfig,
    pub store: StoreKind,
    pub endpoint: EndpointConfig,
    pub usage: UsageConfig,
    /// Wall-clock ceiling for one streamed reply; `None` disables it
    pub stream_timeout_ms: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            backend: BackendConfig::default(),
            store: StoreKind::Remote,
            endpoint: EndpointConfig::default(),
            usage: UsageConfig::default(),
            stream_timeout_ms: Some(120_000),
        }
    }
}

impl ChatConfig {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: ChatConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=2.0).contains(&self.settings.temperature) {
            return Err(crate::ChatError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.settings.temperature
            )));
        }
        if self.settings.max_tokens == 0 {
            return Err(crate::ChatError::Config(
                "maxTokens must be greater than zero".to_string(),
            ));
        }
        if self.endpoint.stream_url.is_empty() {
            return Err(crate::ChatError::Config(
                "endpoint.streamUrl is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generation settings. Snapshotted per thread at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub tools: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            system_prompt: "You are a helpful AI assistant.".to_string(),
            tools: Vec::new(),
        }
    }
}

/// Partial settings update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<String>>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(provider) = patch.provider {
            self.provider = provider;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(temperature) = patch.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(system_prompt) = patch.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(tools) = patch.tools {
            self.tools = tools;
        }
    }
}

/// Which model backend serves the chat endpoint. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendConfig {
    #[serde(rename_all = "camelCase")]
    RemoteAgent {
        agent_id: String,
        #[serde(default)]
        agent_alias_id: Option<String>,
        /// Fixed remote session; a fresh id per call when unset
        #[serde(default)]
        session_id: Option<String>,
        invoke_url: String,
    },
    #[serde(rename_all = "camelCase")]
    OpenAiCompat {
        #[serde(default)]
        api_base: Option<String>,
        #[serde(default)]
        api_key: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::OpenAiCompat {
            api_base: None,
            api_key: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn label(&self) -> &str {
        match self {
            BackendConfig::RemoteAgent { .. } => "remote-agent",
            BackendConfig::OpenAiCompat { .. } => "openai-compat",
        }
    }
}

/// Where threads live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreKind {
    /// The envelope API at `endpoint.apiUrl`, streaming through
    /// `endpoint.streamUrl`
    #[default]
    Remote,
    /// In the page only, lost on reload; replies come straight from the
    /// configured backend
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Envelope API used for thread persistence and non-streaming sends
    pub api_url: String,
    /// Chat-stream endpoint answering `streamMessage`
    pub stream_url: String,
    /// Value of the `x-app` header sent with every request
    pub app: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_url: "/api/captify".to_string(),
            stream_url: "/api/captify".to_string(),
            app: "core".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageConfig {
    pub limit: u64,
    pub period: String,
    pub stream_usage: StreamUsagePolicy,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            limit: 100_000,
            period: "month".to_string(),
            stream_usage: StreamUsagePolicy::Estimate,
        }
    }
}

/// How the streaming path, which reports no token counts, feeds the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamUsagePolicy {
    /// Approximate from text length (about four characters per token)
    Estimate,
    /// Leave the ledger untouched
    Ignore,
}
