#[cfg(test)]
mod tests {
    use crate::app::build_session;
    use chat_core::ports::ThreadStore;
    use chat_types::config::*;
    use chat_types::ChatError;

    #[test]
    fn test_remote_store_wiring() {
        let session = build_session(ChatConfig::default()).unwrap();
        assert_eq!(session.store().backend_name(), "http");
        assert!(session.threads().is_empty());
    }

    #[test]
    fn test_memory_store_wiring() {
        let config = ChatConfig::from_json(r#"{"store": "memory"}"#).unwrap();
        let session = build_session(config).unwrap();
        assert_eq!(session.store().backend_name(), "memory");
        assert_eq!(session.settings(), Settings::default());
    }

    #[test]
    fn test_memory_store_rejects_bad_backend() {
        let config = ChatConfig::from_json(
            r#"{"store": "memory", "backend": {"kind": "remoteAgent", "agentId": "", "invokeUrl": "/invoke"}}"#,
        )
        .unwrap();
        let Err(err) = build_session(config) else {
            panic!("empty agent id accepted");
        };
        assert!(matches!(err, ChatError::Config(_)));
    }
}
