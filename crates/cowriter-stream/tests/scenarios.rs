use std::sync::{Arc, Mutex};

use cowriter_stream::card::{PARSE_FAILURE_MESSAGE, UNEXPECTED_END_MESSAGE};
use cowriter_stream::{
    BadgeSuggestion, CardStatus, FailureKind, FileStore, GenerationRequest, Generator,
    MemoryStore, Notification, NotificationKind, Notifier, RecordedSource, ResponseStoreExt,
    SuggestionCard,
};
use serde_json::json;

const SCENARIO_A: &[&str] = &[
    r#"{"type":"token","content":"H","accumulated":"H","done":false}"#,
    r#"{"type":"token","content":"i","accumulated":"Hi","done":false}"#,
    r#"{"type":"token","content":"","accumulated":"```json\n{\"title\":\"X\",\"description\":\"Y\",\"criteria\":\"Z\"}\n```","done":true}"#,
    "[DONE]",
];

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().expect("lock").push(notification);
    }
}

impl RecordingNotifier {
    fn kinds(&self) -> Vec<NotificationKind> {
        self.seen
            .lock()
            .expect("lock")
            .iter()
            .map(|n| n.kind)
            .collect()
    }
}

fn sse(frames: &[&str]) -> String {
    frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect()
}

async fn run(source: RecordedSource) -> SuggestionCard {
    Generator::builder()
        .source(Arc::new(source))
        .build()
        .expect("build generator")
        .start(GenerationRequest::new("Intro to Python, week 1"))
        .await
        .expect("start")
        .finish()
        .await
        .expect("finish")
}

#[tokio::test]
async fn scenario_a_fenced_json_tokens_complete_the_card() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let generator = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(SCENARIO_A))))
        .store(Arc::new(store.clone()))
        .notifier(notifier.clone())
        .build()
        .expect("build generator");

    let card = generator
        .start(GenerationRequest::new("Intro to Python, week 1"))
        .await
        .expect("start")
        .finish()
        .await
        .expect("finish");

    assert_eq!(card.data(), Some(&BadgeSuggestion::new("X", "Y", "Z")));
    assert_eq!(card.error(), None);
    assert!(!card.loading());
    assert!(card.is_streaming_complete());
    assert!(
        card.raw_streaming_content()
            .is_some_and(|raw| raw.starts_with("```json"))
    );

    assert_eq!(
        store.load_final_response(card.id()).expect("load"),
        Some(json!({"title":"X","description":"Y","criteria":"Z"}))
    );
    assert_eq!(
        store.load_selected_suggestion(card.id()).expect("load"),
        Some(BadgeSuggestion::new("X", "Y", "Z"))
    );
    assert_eq!(notifier.kinds(), vec![NotificationKind::Success]);
}

#[tokio::test]
async fn scenario_a_is_independent_of_chunk_boundaries() {
    let body = sse(SCENARIO_A);
    for chunk_size in [1, 2, 5, 13, 64, body.len()] {
        let card = run(RecordedSource::chunked(body.clone(), chunk_size)).await;
        assert_eq!(
            card.data(),
            Some(&BadgeSuggestion::new("X", "Y", "Z")),
            "chunk size {chunk_size}"
        );
    }
}

#[tokio::test]
async fn scenario_b_backend_error_fails_the_card() {
    let notifier = Arc::new(RecordingNotifier::default());
    let card = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(&[
            r#"{"type":"error","error":"rate limited"}"#,
        ]))))
        .notifier(notifier.clone())
        .build()
        .expect("build generator")
        .start(GenerationRequest::new("course"))
        .await
        .expect("start")
        .finish()
        .await
        .expect("finish");

    assert_eq!(card.error(), Some("rate limited"));
    assert_eq!(card.data(), None);
    assert!(!card.loading());
    assert_eq!(card.failure_kind(), Some(FailureKind::Protocol));
    assert_eq!(notifier.kinds(), vec![NotificationKind::Failure]);
}

#[tokio::test]
async fn scenario_c_legacy_response_payload_is_mapped() {
    let card = run(RecordedSource::new(sse(&[
        r#"{"response":{"badge_name":"Intro to Python","badge_description":"Covers basics","criteria":{"narrative":"Complete 3 exercises"}}}"#,
    ])))
    .await;

    let suggestion = card.data().expect("suggestion");
    assert_eq!(suggestion.title(), "Intro to Python");
    assert_eq!(suggestion.description(), "Covers basics");
    assert_eq!(suggestion.criteria(), "Complete 3 exercises");
    assert_eq!(suggestion.image(), None);
    assert_eq!(
        card.final_response()
            .and_then(|raw| raw.pointer("/response/badge_name")),
        Some(&json!("Intro to Python"))
    );
}

#[tokio::test]
async fn scenario_d_unparseable_final_text_is_a_parse_failure() {
    let card = run(RecordedSource::new(sse(&[
        r#"{"type":"token","content":"Some preamble","accumulated":"Some preamble text without any JSON","done":true}"#,
        "[DONE]",
    ])))
    .await;

    assert_eq!(card.error(), Some(PARSE_FAILURE_MESSAGE));
    assert_eq!(card.failure_kind(), Some(FailureKind::Parse));
    assert_eq!(card.data(), None);
    assert!(!card.loading());
}

#[tokio::test]
async fn scenario_e_end_of_stream_without_terminal_event_fails_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let card = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(&[
            r#"{"type":"start"}"#,
            r#"{"type":"token","content":"{\"ti","accumulated":"{\"ti","done":false}"#,
            r#"{"type":"token","content":"tle\"","accumulated":"{\"title\"","done":false}"#,
        ]))))
        .notifier(notifier.clone())
        .build()
        .expect("build generator")
        .start(GenerationRequest::new("course"))
        .await
        .expect("start")
        .finish()
        .await
        .expect("finish");

    assert!(!card.loading());
    assert_eq!(card.data(), None);
    assert_eq!(card.error(), Some(UNEXPECTED_END_MESSAGE));
    assert_eq!(card.failure_kind(), Some(FailureKind::UnexpectedEnd));
    assert_eq!(card.raw_streaming_content(), Some("{\"title\""));
    assert_eq!(notifier.kinds(), vec![NotificationKind::Failure]);
}

#[tokio::test]
async fn updates_are_observed_in_arrival_order() {
    let generator = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(&[
            r#"{"type":"progress","progress":30}"#,
            r#"{"title":"Ownership","description":"Borrowing rules","criteria":{"narrative":"Pass the quiz"}}"#,
        ]))))
        .build()
        .expect("build generator");

    let mut handle = generator
        .start(GenerationRequest::new("course"))
        .await
        .expect("start");
    assert_eq!(handle.snapshot().status(), &CardStatus::Connecting);

    let mut last = None;
    while let Some(card) = handle.next_update().await {
        last = Some(card);
    }
    let last = last.expect("at least one update");
    assert_eq!(last.data().map(|s| s.criteria()), Some("Pass the quiz"));

    let card = handle.finish().await.expect("finish");
    assert_eq!(card, last);
    assert_eq!(generator.card(card.id()), Some(card));
}

#[tokio::test]
async fn file_store_keeps_results_across_generators() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cowriter.json");

    let card = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(&[
            r#"{"badge_name":"Rust Basics","badge_description":"Variables and types"}"#,
        ]))))
        .store(Arc::new(FileStore::open(&path).expect("open store")))
        .build()
        .expect("build generator")
        .start(GenerationRequest::new("course"))
        .await
        .expect("start")
        .finish()
        .await
        .expect("finish");

    let reopened = FileStore::open(&path).expect("reopen store");
    let selected = reopened
        .load_selected_suggestion(card.id())
        .expect("load")
        .expect("selected suggestion");
    assert_eq!(selected.title(), "Rust Basics");
    assert_eq!(selected.criteria(), "Variables and types");
}

#[tokio::test]
async fn card_view_serializes_flat_ui_shape() {
    let card = run(RecordedSource::new(sse(SCENARIO_A))).await;
    let view = serde_json::to_value(card.view()).expect("serialize view");
    assert_eq!(view["status"], json!("complete"));
    assert_eq!(view["loading"], json!(false));
    assert_eq!(view["error"], json!(null));
    assert_eq!(view["data"]["title"], json!("X"));
    assert_eq!(view["isStreamingComplete"], json!(true));
    assert_eq!(view["streamingStarted"], json!(true));
}

#[tokio::test]
async fn card_view_exposes_the_streaming_preview() {
    let generator = Generator::builder()
        .source(Arc::new(RecordedSource::new(sse(&[
            r#"{"type":"token","content":"{","accumulated":"```json\n{\"title\":\"Draft\"}\n```","done":false}"#,
        ]))))
        .build()
        .expect("build generator");
    let mut handle = generator
        .start(GenerationRequest::new("course"))
        .await
        .expect("start");

    let mut previews = Vec::new();
    while let Some(card) = handle.next_update().await {
        let view = serde_json::to_value(card.view()).expect("serialize view");
        previews.push(view["preview"].clone());
    }
    assert!(previews.contains(&json!("{\n  \"title\": \"Draft\"\n}")));

    let card = handle.finish().await.expect("finish");
    assert_eq!(card.failure_kind(), Some(FailureKind::UnexpectedEnd));
    assert_eq!(card.preview(), Some("{\n  \"title\": \"Draft\"\n}"));
}
