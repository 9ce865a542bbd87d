use super::support::{outline, slide_record, ScriptedBackend};
use deepdesk_core::client::ZStyleRequest;
use deepdesk_core::state::ResearchContext;
use deepdesk_core::generation::{DIRECT_STREAM_PATH, OUTLINE_STREAM_PATH};
use deepdesk_core::{GenerationStep, Notice, NoticeLevel, Notifier, PresentationWorkspace};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

fn workspace() -> (PresentationWorkspace, UnboundedReceiver<Notice>) {
    let (notifier, rx) = Notifier::new();
    (PresentationWorkspace::new(notifier), rx)
}

fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

#[tokio::test]
async fn abort_mid_stream_returns_to_outline_without_presentation() {
    let mut backend = ScriptedBackend::streaming(&[]);
    backend.stream_records = vec![slide_record(1, "Intro"), slide_record(2, "Growth")];
    backend.hang = true;
    let (mut workspace, mut rx) = workspace();

    assert!(workspace
        .generate_outline(&backend, ZStyleRequest::new("Solar Power"))
        .await);
    assert_eq!(workspace.step(), GenerationStep::Outline);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = workspace.generate_slides(&backend, &cancel).await;
    assert!(result.is_none());
    assert_eq!(workspace.step(), GenerationStep::Outline);
    assert!(workspace.presentations().is_empty());
    assert!(workspace.slides().is_empty());
    let notices = drain(&mut rx);
    assert_eq!(notices.last().map(|n| n.level), Some(NoticeLevel::Info));
}

#[tokio::test]
async fn complete_record_adds_exactly_one_presentation() {
    let mut backend = ScriptedBackend::streaming(&[]);
    backend.stream_records = vec![
        "data: {\"type\":\"step_start\",\"step\":1,\"message\":\"Writing slides\"}\n\n".into(),
        slide_record(1, "Intro"),
        slide_record(2, "Growth"),
        "data: {\"type\":\"complete\",\"slides\":[]}\n\n".into(),
        "data: {\"type\":\"done\"}\n\n".into(),
    ];
    let (mut workspace, mut rx) = workspace();
    workspace.set_outline(outline());

    let presentation = workspace
        .generate_slides(&backend, &CancellationToken::new())
        .await
        .expect("presentation");
    assert_eq!(presentation.title, "Solar Power");
    assert_eq!(presentation.slides.len(), 2);
    assert_eq!(workspace.presentations().len(), 1);
    assert_eq!(workspace.step(), GenerationStep::Complete);
    assert_eq!(workspace.progress(), ["Writing slides".to_string()]);

    let bodies = backend.stream_bodies.lock().unwrap();
    assert_eq!(bodies[0].0, OUTLINE_STREAM_PATH);
    assert_eq!(bodies[0].1["outline"]["title"], "Solar Power");
    let notices = drain(&mut rx);
    assert_eq!(notices.last().map(|n| n.level), Some(NoticeLevel::Success));
}

#[tokio::test]
async fn backend_error_record_resets_step() {
    let backend = ScriptedBackend::streaming(&[
        "data: {\"type\":\"error\",\"message\":\"Quota exceeded\"}\n\n",
    ]);
    let (mut workspace, mut rx) = workspace();
    workspace.set_outline(outline());

    assert!(workspace
        .generate_slides(&backend, &CancellationToken::new())
        .await
        .is_none());
    assert_eq!(workspace.step(), GenerationStep::Outline);
    let notices = drain(&mut rx);
    assert_eq!(
        notices.last(),
        Some(&Notice {
            level: NoticeLevel::Error,
            message: "Quota exceeded".into()
        })
    );
}

#[tokio::test]
async fn stream_ending_early_is_reported() {
    let mut backend = ScriptedBackend::streaming(&[]);
    backend.stream_records = vec![slide_record(1, "Intro")];
    let (mut workspace, mut rx) = workspace();
    workspace.set_outline(outline());

    assert!(workspace
        .generate_slides(&backend, &CancellationToken::new())
        .await
        .is_none());
    assert_eq!(workspace.step(), GenerationStep::Outline);
    assert!(workspace.presentations().is_empty());
    assert_eq!(drain(&mut rx).last().map(|n| n.level), Some(NoticeLevel::Error));
}

#[tokio::test]
async fn slides_need_an_outline() {
    let backend = ScriptedBackend::default();
    let (mut workspace, mut rx) = workspace();
    assert!(workspace
        .generate_slides(&backend, &CancellationToken::new())
        .await
        .is_none());
    assert_eq!(workspace.step(), GenerationStep::Input);
    assert!(backend.stream_bodies.lock().unwrap().is_empty());
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn outline_failure_stays_on_input() {
    let backend = ScriptedBackend::failing(500);
    let (mut workspace, mut rx) = workspace();
    assert!(!workspace
        .generate_outline(&backend, ZStyleRequest::new("Solar"))
        .await);
    assert_eq!(workspace.step(), GenerationStep::Input);
    assert_eq!(
        drain(&mut rx).pop().map(|n| n.message),
        Some("Backend request failed".to_string())
    );
}

#[tokio::test]
async fn direct_generation_uses_topic_request() {
    let backend = ScriptedBackend::streaming(&[
        "data: {\"type\":\"complete\",\"title\":\"Deck\",\"slides\":[{\"type\":\"title\",\"title\":\"Deck\"}]}\n\n",
    ]);
    let (mut workspace, _rx) = workspace();
    let presentation = workspace
        .generate_direct(&backend, ZStyleRequest::new("Solar"), &CancellationToken::new())
        .await
        .expect("presentation");
    assert_eq!(presentation.title, "Deck");
    assert_eq!(presentation.metadata["theme"], "dark");
    let bodies = backend.stream_bodies.lock().unwrap();
    assert_eq!(bodies[0].0, DIRECT_STREAM_PATH);
    assert_eq!(bodies[0].1["topic"], "Solar");
    assert_eq!(bodies[0].1["slide_count"], 8);
}

#[tokio::test]
async fn reset_returns_to_input() {
    let (mut workspace, _rx) = workspace();
    workspace.set_outline(outline());
    workspace.reset();
    assert_eq!(workspace.step(), GenerationStep::Input);
    assert!(workspace.outline().is_none());
}

#[tokio::test]
async fn outline_step_sends_style_and_slides_send_research_text() {
    let backend = ScriptedBackend::streaming(&[
        "data: {\"type\":\"complete\",\"title\":\"Solar\",\"slides\":[{\"title\":\"One\"}]}\n\n",
    ]);
    let (mut workspace, _rx) = workspace();
    let context = ResearchContext {
        query: "solar adoption".into(),
        results: serde_json::json!({"executive_summary": "Adoption doubled.", "key_findings": ["Cheaper"]}),
        timestamp: chrono::Utc::now(),
        model: "gemini-2.0-flash-exp".into(),
        search_engine: "hybrid".into(),
    };
    let mut request = ZStyleRequest::new("Solar").with_research(&context);
    request.style = "minimal".into();

    assert!(workspace.generate_outline(&backend, request).await);
    let sent = serde_json::to_value(&backend.outline_requests.lock().unwrap()[0]).unwrap();
    assert_eq!(sent["style"], "minimal");
    assert!(sent.get("theme").is_none());

    workspace
        .generate_slides(&backend, &CancellationToken::new())
        .await
        .expect("presentation");
    let bodies = backend.stream_bodies.lock().unwrap();
    let research = bodies[0].1["research_context"].as_str().expect("research text");
    assert!(research.contains("Adoption doubled."));
}
