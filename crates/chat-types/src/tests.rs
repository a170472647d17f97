#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::*;
    use crate::config::*;
    use crate::error::*;
    use crate::event::*;
    use crate::message::*;
    use crate::stream::*;
    use crate::thread::*;
    use crate::usage::*;

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_user() {
        let msg = Message::user("t1", "Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.thread_id, "t1");
        assert!(msg.id.starts_with("msg_"));
        assert!(msg.token_usage.is_none());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::assistant("t1", "a");
        let b = Message::assistant("t1", "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_message_wire_shape_is_camel_case() {
        let msg = Message::assistant("t1", "hi").with_usage(MessageUsage {
            input: 3,
            output: 4,
            estimated: false,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tokenUsage"]["input"], 3);
        assert!(json.get("createdAt").is_some());
        // empty attachments and the estimated flag stay off the wire
        assert!(json.get("toolRuns").is_none());
        assert!(json["tokenUsage"].get("estimated").is_none());
    }

    #[test]
    fn test_message_with_tool_runs_deserializes() {
        let json = r#"{
            "id": "msg_1",
            "threadId": "t1",
            "role": "assistant",
            "content": "",
            "toolRuns": [{"id": "r1", "name": "search", "status": "succeeded"}],
            "createdAt": "2025-01-01T00:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.tool_runs.len(), 1);
        assert_eq!(msg.tool_runs[0].status, ToolRunStatus::Succeeded);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!(serde_json::from_str::<Role>(r#""tool""#).is_err());
    }

    // ─── Thread Tests ────────────────────────────────────────

    #[test]
    fn test_thread_new_defaults() {
        let thread = Thread::new(DEFAULT_THREAD_TITLE, Settings::default());
        assert_eq!(thread.title, "New Chat");
        assert!(thread.id.starts_with("thread_"));
        assert!(thread.messages.is_empty());
        assert_eq!(thread.message_count, 0);
        assert_eq!(thread.created_at, thread.updated_at);
    }

    #[test]
    fn test_thread_push_message_updates_count() {
        let mut thread = Thread::new("t", Settings::default());
        thread.push_message(Message::user(&thread.id.clone(), "a"));
        thread.push_message(Message::assistant(&thread.id.clone(), "b"));
        assert_eq!(thread.message_count, 2);
        assert_eq!(thread.last_message().unwrap().content, "b");
    }

    #[test]
    fn test_thread_updates_apply() {
        let mut thread = Thread::new("old", Settings::default());
        let id = thread.id.clone();
        ThreadUpdates::title("new").apply_to(&mut thread);
        assert_eq!(thread.title, "new");

        let messages = vec![Message::user(&id, "x"), Message::assistant(&id, "y")];
        ThreadUpdates::messages(messages).apply_to(&mut thread);
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.message_count, 2);
        assert_eq!(thread.title, "new");
    }

    #[test]
    fn test_thread_updates_skip_none_fields() {
        let json = serde_json::to_value(ThreadUpdates::title("x")).unwrap();
        assert_eq!(json, serde_json::json!({"title": "x"}));
        assert!(ThreadUpdates::default().is_empty());
    }

    #[test]
    fn test_new_thread_from_settings() {
        let settings = Settings {
            model: "claude".to_string(),
            provider: "anthropic".to_string(),
            ..Settings::default()
        };
        let req = NewThread::from_settings(None, &settings);
        assert_eq!(req.title, DEFAULT_THREAD_TITLE);
        assert_eq!(req.model, "claude");
        assert_eq!(req.provider, "anthropic");

        let req = NewThread::from_settings(Some("Budget"), &settings);
        assert_eq!(req.title, "Budget");
    }

    #[test]
    fn test_thread_deserializes_without_optional_fields() {
        let json = r#"{
            "id": "thread_1",
            "title": "T",
            "settings": {"model": "m"},
            "createdAt": "a",
            "updatedAt": "b"
        }"#;
        let thread: Thread = serde_json::from_str(json).unwrap();
        assert!(thread.messages.is_empty());
        assert_eq!(thread.settings.model, "m");
        assert_eq!(thread.settings.max_tokens, 4000);
        assert_eq!(thread.token_usage, UsageTotals::default());
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.settings.model, "gpt-4o");
        assert_eq!(config.settings.provider, "openai");
        assert!((config.settings.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.settings.max_tokens, 4000);
        assert_eq!(config.usage.limit, 100_000);
        assert_eq!(config.usage.stream_usage, StreamUsagePolicy::Estimate);
        assert_eq!(config.endpoint.stream_url, "/api/captify");
        assert_eq!(config.store, StoreKind::Remote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_memory_store() {
        let config = ChatConfig::from_json(r#"{"store": "memory"}"#).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
    }

    #[test]
    fn test_config_from_empty_json_uses_defaults() {
        let config = ChatConfig::from_json("{}").unwrap();
        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn test_config_remote_agent_backend() {
        let json = r#"{
            "backend": {
                "kind": "remoteAgent",
                "agentId": "AG123",
                "invokeUrl": "https://agents.example/invoke"
            },
            "usage": {"streamUsage": "ignore"}
        }"#;
        let config = ChatConfig::from_json(json).unwrap();
        match &config.backend {
            BackendConfig::RemoteAgent { agent_id, agent_alias_id, session_id, invoke_url } => {
                assert_eq!(agent_id, "AG123");
                assert!(agent_alias_id.is_none());
                assert!(session_id.is_none());
                assert_eq!(invoke_url, "https://agents.example/invoke");
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(config.backend.label(), "remote-agent");
        assert_eq!(config.usage.stream_usage, StreamUsagePolicy::Ignore);
        assert_eq!(config.usage.limit, 100_000);
    }

    #[test]
    fn test_config_rejects_bad_temperature() {
        let err = ChatConfig::from_json(r#"{"settings": {"temperature": 5.0}}"#).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        let err = ChatConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ChatError::Serialization(_)));
    }

    #[test]
    fn test_settings_apply_patch() {
        let mut settings = Settings::default();
        settings.apply(SettingsPatch {
            model: Some("gpt-4o-mini".to_string()),
            temperature: Some(0.2),
            ..SettingsPatch::default()
        });
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!((settings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.provider, "openai");
    }

    // ─── Usage Tests ─────────────────────────────────────────

    #[test]
    fn test_usage_unknown() {
        assert!(Usage::unknown().is_unknown());
        let known = Usage {
            input_tokens: Some(1),
            ..Usage::default()
        };
        assert!(!known.is_unknown());
    }

    #[test]
    fn test_ledger_is_additive() {
        let mut ledger = UsageLedger::new(100, "month");
        ledger.record(&UsageTotals { input: 10, output: 5, total: 15 });
        ledger.record(&UsageTotals { input: 1, output: 2, total: 3 });
        assert_eq!(ledger.totals, UsageTotals { input: 11, output: 7, total: 18 });
        assert_eq!(ledger.remaining(), 82);
        assert!((ledger.fraction_used() - 0.18).abs() < 1e-9);

        ledger.reset();
        assert_eq!(ledger.totals, UsageTotals::default());
        assert_eq!(ledger.limit, 100);
    }

    #[test]
    fn test_ledger_remaining_saturates() {
        let mut ledger = UsageLedger::new(10, "month");
        ledger.sync(UsageTotals { input: 20, output: 0, total: 20 });
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // counted in characters, not bytes
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn test_totals_from_message_usage() {
        let totals: UsageTotals = MessageUsage { input: 2, output: 3, estimated: true }.into();
        assert_eq!(totals, UsageTotals { input: 2, output: 3, total: 5 });
    }

    // ─── Stream Contract Tests ───────────────────────────────

    #[test]
    fn test_stream_part_kinds() {
        let start = StreamPart::StreamStart { warnings: vec![] };
        let delta = StreamPart::TextDelta { id: "1".to_string(), delta: "x".to_string() };
        let finish = StreamPart::Finish { finish_reason: FinishReason::Stop, usage: Usage::unknown() };
        let error = StreamPart::Error { error: ChatError::Backend("boom".to_string()) };
        assert_eq!(start.kind(), "stream-start");
        assert_eq!(delta.kind(), "text-delta");
        assert_eq!(finish.kind(), "finish");
        assert_eq!(error.kind(), "error");
        assert!(!start.is_terminal());
        assert!(!delta.is_terminal());
        assert!(finish.is_terminal());
        assert!(error.is_terminal());
    }

    #[test]
    fn test_finish_reason_from_provider() {
        assert_eq!(FinishReason::from_provider("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_provider("tool_calls"), FinishReason::Other);
        assert_eq!(serde_json::to_string(&FinishReason::ContentFilter).unwrap(), r#""content-filter""#);
    }

    #[test]
    fn test_stream_payload_wire_shape() {
        let json = serde_json::to_string(&StreamPayload::content("Hel")).unwrap();
        assert_eq!(json, r#"{"content":"Hel"}"#);
        let payload: StreamPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload, StreamPayload::default());
    }

    #[test]
    fn test_prompt_message_from_message() {
        let msg = Message::user("t", "question");
        let prompt = PromptMessage::from(&msg);
        assert_eq!(prompt, PromptMessage::user("question"));
    }

    // ─── Envelope Tests ──────────────────────────────────────

    #[test]
    fn test_envelope_success() {
        let env: ApiEnvelope<Deleted> =
            serde_json::from_str(r#"{"success": true, "data": {"deleted": true}}"#).unwrap();
        assert_eq!(env.into_data().unwrap(), Deleted { deleted: true });
    }

    #[test]
    fn test_envelope_failure_is_persistence_error() {
        let env: ApiEnvelope<Thread> =
            serde_json::from_str(r#"{"success": false, "error": "Thread not found"}"#).unwrap();
        let err = env.into_result().unwrap_err();
        assert_eq!(err, ChatError::Persistence("Thread not found".to_string()));
    }

    #[test]
    fn test_envelope_success_without_data() {
        let env: ApiEnvelope<Thread> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(env.clone().into_result().unwrap().is_none());
        assert!(matches!(env.into_data(), Err(ChatError::Persistence(_))));
    }

    #[test]
    fn test_service_request_shape() {
        let req = ServiceRequest::agent(
            operation::STREAM_MESSAGE,
            SendMessageRequest {
                thread_id: "t1".to_string(),
                message: "hello".to_string(),
                settings: Settings::default(),
            },
        )
        .unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["service"], "agent");
        assert_eq!(json["operation"], "streamMessage");
        assert_eq!(json["data"]["threadId"], "t1");
        assert_eq!(json["data"]["message"], "hello");
        assert_eq!(json["data"]["settings"]["maxTokens"], 4000);

        let back: SendMessageRequest = req.data_as().unwrap();
        assert_eq!(back.message, "hello");
    }

    // ─── Event & Error Tests ─────────────────────────────────

    #[test]
    fn test_session_event_serialization() {
        let event = SessionEvent::StreamUpdated {
            thread_id: "t1".to_string(),
            text: "Hel".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "streamUpdated");
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["text"], "Hel");

        let phase = SessionEvent::PhaseChanged {
            thread_id: "t1".to_string(),
            phase: ThreadPhase::Streaming,
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["phase"], "streaming");
    }

    #[test]
    fn test_error_display() {
        let err = ChatError::remote_agent("error", "socket closed");
        assert_eq!(err.to_string(), "remote agent error: socket closed");

        let err = ChatError::StreamInProgress { thread_id: "t1".to_string() };
        assert!(err.to_string().contains("t1"));

        let err = ChatError::Timeout(5000);
        assert_eq!(err.to_string(), "Timeout after 5000ms");
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err: ChatError = json_err.into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }

    #[test]
    fn test_result_alias() {
        let ok: crate::Result<u8> = Ok(1);
        assert_eq!(ok.unwrap(), 1);
    }
}
