use serde::{Deserialize, Serialize};
use crate::config::Settings;
use crate::message::Message;
use crate::usage::UsageTotals;

pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub settings: Settings,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub message_count: usize,
    /// Thread-cumulative usage
    #[serde(default)]
    pub token_usage: UsageTotals,
}

impl Thread {
    pub fn new(title: impl Into<String>, settings: Settings) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: new_thread_id(),
            title: title.into(),
            messages: Vec::new(),
            settings,
            created_at: now.clone(),
            updated_at: now,
            message_count: 0,
            token_usage: UsageTotals::default(),
        }
    }

    /// Append a message and keep the denormalised count in step.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.message_count = self.messages.len();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

pub fn new_thread_id() -> String {
    format!("thread_{}", uuid::Uuid::new_v4().simple())
}

/// Request to create a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub title: String,
    pub model: String,
    pub provider: String,
    pub settings: Settings,
}

impl NewThread {
    pub fn from_settings(title: Option<&str>, settings: &Settings) -> Self {
        Self {
            title: title.unwrap_or(DEFAULT_THREAD_TITLE).to_string(),
            model: settings.model.clone(),
            provider: settings.provider.clone(),
            settings: settings.clone(),
        }
    }
}

/// Fields a thread update may touch. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadUpdates {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub settings: Option<Settings>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub messages: Option<Vec<Message>>,
}

impl ThreadUpdates {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.settings.is_none() && self.messages.is_none()
    }

    /// Apply the updates to a local copy.
    pub fn apply_to(&self, thread: &mut Thread) {
        if let Some(title) = &self.title {
            thread.title = title.clone();
        }
        if let Some(settings) = &self.settings {
            thread.settings = settings.clone();
        }
        if let Some(messages) = &self.messages {
            thread.messages = messages.clone();
            thread.message_count = thread.messages.len();
        }
        thread.touch();
    }
}
