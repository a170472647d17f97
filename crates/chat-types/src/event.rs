use serde::{Deserialize, Serialize};
use crate::message::Role;
use crate::usage::UsageLedger;

/// Per-thread operation phase.
///
/// `Error` lasts only for the failing operation; the thread is back to
/// `Idle` once the operation has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPhase {
    Idle,
    Sending,
    Streaming,
    Error,
}

/// Events emitted by the conversation session.
/// Presentation surfaces drain these and redraw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    ThreadsLoaded { count: usize },

    #[serde(rename_all = "camelCase")]
    ThreadCreated { thread_id: String },

    #[serde(rename_all = "camelCase")]
    ThreadSelected { thread_id: String },

    ThreadCleared,

    #[serde(rename_all = "camelCase")]
    ThreadDeleted { thread_id: String },

    #[serde(rename_all = "camelCase")]
    ThreadRenamed { thread_id: String, title: String },

    #[serde(rename_all = "camelCase")]
    PhaseChanged { thread_id: String, phase: ThreadPhase },

    #[serde(rename_all = "camelCase")]
    MessageAppended {
        thread_id: String,
        message_id: String,
        role: Role,
    },

    /// Cumulative text of the in-flight reply
    #[serde(rename_all = "camelCase")]
    StreamUpdated { thread_id: String, text: String },

    #[serde(rename_all = "camelCase")]
    StreamFinished { thread_id: String, message_id: String },

    UsageUpdated { ledger: UsageLedger },

    #[serde(rename_all = "camelCase")]
    Error {
        thread_id: Option<String>,
        message: String,
    },
}
