//! WASM-target tests for chat-types.
//!
//! Mirrors the native unit tests but runs under wasm32-unknown-unknown
//! via `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use chat_types::api::*;
use chat_types::config::*;
use chat_types::error::*;
use chat_types::event::*;
use chat_types::message::*;
use chat_types::thread::*;
use chat_types::usage::*;

// ─── Message Tests ───────────────────────────────────────

#[wasm_bindgen_test]
fn message_constructors() {
    let msg = Message::user("t1", "Hello");
    assert_eq!(msg.role, Role::User);
    assert_eq!(msg.thread_id, "t1");
    assert!(msg.id.starts_with("msg_"));
    assert!(msg.token_usage.is_none());

    let reply = Message::assistant("t1", "Hi").with_usage(MessageUsage {
        input: 2,
        output: 1,
        estimated: true,
    });
    assert_eq!(reply.token_usage.unwrap().total(), 3);
}

#[wasm_bindgen_test]
fn message_wire_shape() {
    let json = serde_json::to_value(Message::system("t1", "be brief")).unwrap();
    assert_eq!(json["role"], "system");
    assert_eq!(json["threadId"], "t1");
    assert!(json.get("toolRuns").is_none());
    assert!(json.get("tokenUsage").is_none());
}

// ─── Thread Tests ────────────────────────────────────────

#[wasm_bindgen_test]
fn thread_push_keeps_count() {
    let mut thread = Thread::new(DEFAULT_THREAD_TITLE, Settings::default());
    thread.push_message(Message::user(&thread.id.clone(), "a"));
    thread.push_message(Message::assistant(&thread.id.clone(), "b"));
    assert_eq!(thread.message_count, 2);
    assert_eq!(thread.last_message().unwrap().content, "b");
}

#[wasm_bindgen_test]
fn thread_updates_apply() {
    let mut thread = Thread::new("Old", Settings::default());
    ThreadUpdates::title("New").apply_to(&mut thread);
    assert_eq!(thread.title, "New");
    assert!(ThreadUpdates::default().is_empty());
}

// ─── Envelope Tests ──────────────────────────────────────

#[wasm_bindgen_test]
fn envelope_failure_is_persistence() {
    let envelope: ApiEnvelope<Thread> =
        serde_json::from_str(r#"{"success": false, "error": "db down"}"#).unwrap();
    assert_eq!(
        envelope.into_data().unwrap_err(),
        ChatError::Persistence("db down".to_string())
    );
}

#[wasm_bindgen_test]
fn service_request_shape() {
    let request = ServiceRequest::agent(operation::GET_THREADS, GetThreadsRequest { limit: 50 }).unwrap();
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["service"], "agent");
    assert_eq!(json["operation"], "getThreads");
    assert_eq!(json["data"]["limit"], 50);
}

// ─── Config Tests ────────────────────────────────────────

#[wasm_bindgen_test]
fn config_from_json_defaults() {
    let config = ChatConfig::from_json("{}").unwrap();
    assert_eq!(config.store, StoreKind::Remote);
    assert_eq!(config.usage.stream_usage, StreamUsagePolicy::Estimate);
    assert_eq!(config.stream_timeout_ms, Some(120_000));
}

#[wasm_bindgen_test]
fn config_rejects_zero_max_tokens() {
    let err = ChatConfig::from_json(r#"{"settings": {"maxTokens": 0}}"#).unwrap_err();
    assert!(matches!(err, ChatError::Config(_)));
}

// ─── Event & Usage Tests ─────────────────────────────────

#[wasm_bindgen_test]
fn session_event_tagged() {
    let event = SessionEvent::StreamUpdated {
        thread_id: "t1".to_string(),
        text: "Hel".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "streamUpdated");
    assert_eq!(json["threadId"], "t1");
}

#[wasm_bindgen_test]
fn ledger_records_and_caps() {
    let mut ledger = UsageLedger::new(10, "month");
    ledger.record(&UsageTotals { input: 4, output: 8, total: 12 });
    assert_eq!(ledger.remaining(), 0);
    ledger.reset();
    assert_eq!(ledger.remaining(), 10);
}

#[wasm_bindgen_test]
fn estimate_rounds_up() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abcde"), 2);
}
