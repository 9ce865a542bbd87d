use super::support::ScriptedBackend;
use deepdesk_core::chat::{CHAT_FALLBACK, RESEARCH_FALLBACK};
use deepdesk_core::{
    ChatController, MessageRole, NoticeLevel, Notifier, ResearchOptions, SessionStore,
    SettingsPatch,
};
use std::sync::Arc;

#[tokio::test]
async fn reply_is_appended_with_metadata() {
    let backend = Arc::new(ScriptedBackend::default());
    let sessions = SessionStore::in_memory();
    sessions.set_user_id(Some("a@example.com".into()));
    sessions.update_settings(SettingsPatch {
        realtime_research_mode: Some(true),
        ..SettingsPatch::default()
    });
    let controller = ChatController::new(sessions.clone(), backend.clone(), Notifier::detached());

    let reply = controller.send_message("What is new in solar?").await.expect("reply");
    assert_eq!(reply.content, "echo: What is new in solar?");
    let metadata = reply.metadata.expect("metadata");
    assert!(!metadata.is_error);
    assert_eq!(metadata.sources.len(), 1);

    let requests = backend.chat_requests.lock().unwrap();
    assert_eq!(requests[0].user_id.as_deref(), Some("a@example.com"));
    assert!(requests[0].realtime_research_mode);
    assert!(requests[0].chat_history.is_empty());

    let session = sessions.current_session().expect("session");
    assert_eq!(session.title, "What is new in solar?");
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn history_carries_prior_turns() {
    let backend = Arc::new(ScriptedBackend::default());
    let controller =
        ChatController::new(SessionStore::in_memory(), backend.clone(), Notifier::detached());
    controller.send_message("first").await;
    controller.send_message("second").await;

    let requests = backend.chat_requests.lock().unwrap();
    let roles: Vec<&str> = requests[1]
        .chat_history
        .iter()
        .map(|entry| entry.role.as_str())
        .collect();
    assert_eq!(roles, vec!["user", "assistant"]);
}

#[tokio::test]
async fn failure_appends_fallback_and_notifies() {
    let backend = Arc::new(ScriptedBackend::failing(503));
    let (notifier, mut rx) = Notifier::new();
    let sessions = SessionStore::in_memory();
    let controller = ChatController::new(sessions.clone(), backend.clone(), notifier);

    let reply = controller.send_message("hello").await.expect("fallback");
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, CHAT_FALLBACK);
    assert!(reply.metadata.expect("metadata").is_error);
    assert_eq!(rx.try_recv().expect("notice").level, NoticeLevel::Error);
    assert_eq!(backend.chat_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let backend = Arc::new(ScriptedBackend::default());
    let sessions = SessionStore::in_memory();
    let controller = ChatController::new(sessions.clone(), backend.clone(), Notifier::detached());
    assert!(controller.send_message("   ").await.is_none());
    assert!(sessions.session_summaries().is_empty());
    assert!(backend.chat_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn research_records_context() {
    let backend = Arc::new(ScriptedBackend::default());
    let sessions = SessionStore::in_memory();
    let controller = ChatController::new(sessions.clone(), backend, Notifier::detached());

    let report = controller
        .run_research("solar trends", ResearchOptions::default())
        .await
        .expect("report");
    assert_eq!(report.finding_lines(), vec!["Costs fell"]);

    let session = sessions.current_session().expect("session");
    let context = session.research_context.expect("context");
    assert_eq!(context.query, "solar trends");
    let last = session.messages.last().expect("message");
    assert!(last.content.starts_with("Solar is growing."));
}

#[tokio::test]
async fn research_failure_uses_fallback() {
    let backend = Arc::new(ScriptedBackend::failing(500));
    let sessions = SessionStore::in_memory();
    let controller = ChatController::new(sessions.clone(), backend, Notifier::detached());
    assert!(controller
        .run_research("solar", ResearchOptions::default())
        .await
        .is_none());
    let session = sessions.current_session().expect("session");
    assert_eq!(session.messages.last().expect("message").content, RESEARCH_FALLBACK);
    assert!(session.research_context.is_none());
}
