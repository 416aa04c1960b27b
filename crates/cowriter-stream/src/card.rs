//! Per-request card state and its transitions.
//!
//! A card moves `Idle -> Connecting -> Streaming -> (Parsing) -> Complete`, or
//! ends in `Failed`/`Cancelled`. Terminal cards ignore further events until
//! [`SuggestionCard::begin`] starts a new generation on them. UI flags such as
//! `loading` are derived from the status, never stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::accumulator::TokenAccumulator;
use crate::extract::{self, Extraction};
use crate::mapper::map_suggestion;
use crate::stream::StreamEvent;
use crate::suggestion::BadgeSuggestion;

/// Message for a `done` token whose text holds no parseable object.
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse generated JSON";
/// Message for a stream that closed without a terminal payload.
pub const UNEXPECTED_END_MESSAGE: &str = "Stream ended before a badge suggestion was produced";

/// Why a card failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The endpoint was unreachable, rejected the request, or the body read failed.
    Connection,
    /// The backend sent an error frame.
    Protocol,
    /// The final generated text held no parseable JSON object.
    Parse,
    /// The stream closed without a final payload or `done` token.
    UnexpectedEnd,
    /// The generation exceeded its configured timeout.
    Timeout,
}

/// Lifecycle state of a card.
#[derive(Clone, Debug, PartialEq)]
pub enum CardStatus {
    Idle,
    Connecting,
    Streaming,
    Parsing,
    Complete { suggestion: BadgeSuggestion },
    Failed { kind: FailureKind, message: String },
    Cancelled,
}

impl CardStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Parsing => "parsing",
            Self::Complete { .. } => "complete",
            Self::Failed { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// What a transition did, so the reconciler knows which side effects to run.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The event did not change the card.
    Ignored,
    /// Non-terminal state changed.
    Updated,
    /// The card completed; `raw` is the payload the suggestion was mapped from.
    Completed { raw: Value },
    /// The card failed.
    Failed,
    /// The card was cancelled.
    Cancelled,
}

/// State for one generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionCard {
    id: uuid::Uuid,
    status: CardStatus,
    tokens: TokenAccumulator,
    is_streaming_complete: bool,
    streaming_started: bool,
    progress: Option<f64>,
    status_text: Option<String>,
    preview: Option<String>,
    final_response: Option<Value>,
}

impl SuggestionCard {
    /// Creates an idle card.
    pub fn new(id: uuid::Uuid) -> Self {
        Self {
            id,
            status: CardStatus::Idle,
            tokens: TokenAccumulator::new(),
            is_streaming_complete: false,
            streaming_started: false,
            progress: None,
            status_text: None,
            preview: None,
            final_response: None,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn status(&self) -> &CardStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `true` while a generation is in flight.
    pub fn loading(&self) -> bool {
        matches!(
            self.status,
            CardStatus::Connecting | CardStatus::Streaming | CardStatus::Parsing
        )
    }

    pub fn data(&self) -> Option<&BadgeSuggestion> {
        match &self.status {
            CardStatus::Complete { suggestion } => Some(suggestion),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            CardStatus::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            CardStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Running generated text, once any token has arrived.
    pub fn raw_streaming_content(&self) -> Option<&str> {
        (self.tokens.token_count() > 0).then(|| self.tokens.buffer())
    }

    pub fn is_streaming_complete(&self) -> bool {
        self.is_streaming_complete
    }

    pub fn streaming_started(&self) -> bool {
        self.streaming_started
    }

    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Pretty-printed JSON parsed from the partial stream, if any.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Raw terminal payload or extracted object the suggestion came from.
    pub fn final_response(&self) -> Option<&Value> {
        self.final_response.as_ref()
    }

    /// Starts (or restarts) a generation: clears all prior results and moves
    /// to `Connecting`.
    pub fn begin(&mut self) {
        *self = Self::new(self.id);
        self.status = CardStatus::Connecting;
        self.status_text = Some("Connecting".to_string());
    }

    /// Applies one decoded event.
    pub fn apply(&mut self, event: StreamEvent) -> Outcome {
        if self.status.is_terminal() || self.status == CardStatus::Idle {
            debug!(card_id = %self.id, status = self.status.label(), event = event.kind(), "ignoring event for inactive card");
            return Outcome::Ignored;
        }

        match event {
            StreamEvent::Start => {
                if self.streaming_started {
                    return Outcome::Ignored;
                }
                self.enter_streaming();
                Outcome::Updated
            }
            StreamEvent::Token {
                accumulated, done, ..
            } => {
                self.enter_streaming();
                self.tokens.push(&accumulated, done);
                self.is_streaming_complete = done;
                if done {
                    self.parse_final_text()
                } else {
                    if let Some(preview) = extract::preview(self.tokens.buffer()) {
                        self.preview = Some(preview);
                    }
                    Outcome::Updated
                }
            }
            StreamEvent::Progress { percent } => {
                self.enter_streaming();
                self.progress = Some(percent);
                self.status_text = Some(format!("Generating ({percent:.0}%)"));
                Outcome::Updated
            }
            StreamEvent::FinalPayload { raw } => {
                self.enter_streaming();
                self.is_streaming_complete = true;
                self.complete(raw)
            }
            StreamEvent::Error { message } => self.fail(FailureKind::Protocol, message),
            StreamEvent::Complete => self.end_of_stream(),
        }
    }

    /// Handles the stream closing. Only reached without a terminal event, so
    /// the card fails as an unexpected end.
    pub fn end_of_stream(&mut self) -> Outcome {
        if self.status.is_terminal() {
            return Outcome::Ignored;
        }
        self.fail(FailureKind::UnexpectedEnd, UNEXPECTED_END_MESSAGE)
    }

    /// Moves a non-terminal card to `Failed`.
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> Outcome {
        if self.status.is_terminal() {
            return Outcome::Ignored;
        }
        let message = message.into();
        warn!(card_id = %self.id, ?kind, %message, "card failed");
        self.status = CardStatus::Failed { kind, message };
        self.status_text = None;
        Outcome::Failed
    }

    /// Moves a non-terminal card to `Cancelled`.
    pub fn cancel(&mut self) -> Outcome {
        if self.status.is_terminal() {
            return Outcome::Ignored;
        }
        info!(card_id = %self.id, "card cancelled");
        self.status = CardStatus::Cancelled;
        self.status_text = None;
        Outcome::Cancelled
    }

    /// Flat snapshot for UI layers and serialization.
    pub fn view(&self) -> CardView {
        CardView {
            id: self.id,
            status: self.status.label(),
            data: self.data().cloned(),
            loading: self.loading(),
            error: self.error().map(ToOwned::to_owned),
            raw_streaming_content: self.raw_streaming_content().map(ToOwned::to_owned),
            preview: self.preview.clone(),
            is_streaming_complete: self.is_streaming_complete,
            streaming_started: self.streaming_started,
            progress: self.progress,
        }
    }

    fn enter_streaming(&mut self) {
        if self.status == CardStatus::Connecting {
            self.status = CardStatus::Streaming;
            self.streaming_started = true;
            self.status_text = Some("Connected".to_string());
            debug!(card_id = %self.id, "card streaming");
        }
    }

    fn parse_final_text(&mut self) -> Outcome {
        self.status = CardStatus::Parsing;
        match extract::extract_json(self.tokens.buffer()) {
            Extraction::Ready(value) => self.complete(value),
            Extraction::NotYetAvailable => self.fail(FailureKind::Parse, PARSE_FAILURE_MESSAGE),
        }
    }

    fn complete(&mut self, raw: Value) -> Outcome {
        let suggestion = map_suggestion(&raw);
        info!(card_id = %self.id, title = suggestion.title(), "card complete");
        self.status = CardStatus::Complete { suggestion };
        self.status_text = None;
        self.final_response = Some(raw.clone());
        Outcome::Completed { raw }
    }
}

/// Serializable flat view of a card.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: uuid::Uuid,
    pub status: &'static str,
    pub data: Option<BadgeSuggestion>,
    pub loading: bool,
    pub error: Option<String>,
    pub raw_streaming_content: Option<String>,
    /// Pretty-printed object parsed from the partial text, for optimistic display.
    pub preview: Option<String>,
    pub is_streaming_complete: bool,
    pub streaming_started: bool,
    pub progress: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::decode_frame;
    use serde_json::json;

    fn started_card() -> SuggestionCard {
        let mut card = SuggestionCard::new(uuid::Uuid::new_v4());
        card.begin();
        card
    }

    fn token(accumulated: &str, done: bool) -> StreamEvent {
        StreamEvent::Token {
            fragment: String::new(),
            accumulated: accumulated.to_string(),
            done,
        }
    }

    #[test]
    fn begin_moves_idle_card_to_connecting_and_loading() {
        let card = started_card();
        assert_eq!(card.status(), &CardStatus::Connecting);
        assert!(card.loading());
        assert_eq!(card.error(), None);
        assert_eq!(card.data(), None);
    }

    #[test]
    fn idle_cards_ignore_events() {
        let mut card = SuggestionCard::new(uuid::Uuid::new_v4());
        assert_eq!(card.apply(StreamEvent::Start), Outcome::Ignored);
        assert_eq!(card.status(), &CardStatus::Idle);
    }

    #[test]
    fn start_event_enters_streaming_once() {
        let mut card = started_card();
        assert_eq!(card.apply(StreamEvent::Start), Outcome::Updated);
        assert_eq!(card.status(), &CardStatus::Streaming);
        assert!(card.streaming_started());
        assert_eq!(card.status_text(), Some("Connected"));
        assert_eq!(card.apply(StreamEvent::Start), Outcome::Ignored);
    }

    #[test]
    fn fenced_done_token_completes_card() {
        let mut card = started_card();
        for payload in [
            r#"{"type":"token","content":"H","accumulated":"H","done":false}"#,
            r#"{"type":"token","content":"i","accumulated":"Hi","done":false}"#,
        ] {
            assert_eq!(card.apply(decode_frame(payload)), Outcome::Updated);
        }
        assert_eq!(card.raw_streaming_content(), Some("Hi"));
        assert!(!card.is_streaming_complete());

        let outcome = card.apply(decode_frame(
            r#"{"type":"token","content":"","accumulated":"```json\n{\"title\":\"X\",\"description\":\"Y\",\"criteria\":\"Z\"}\n```","done":true}"#,
        ));
        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(card.apply(decode_frame("[DONE]")), Outcome::Ignored);

        assert_eq!(card.data(), Some(&BadgeSuggestion::new("X", "Y", "Z")));
        assert_eq!(card.error(), None);
        assert!(!card.loading());
        assert!(card.is_streaming_complete());
        assert_eq!(
            card.final_response(),
            Some(&json!({"title":"X","description":"Y","criteria":"Z"}))
        );
    }

    #[test]
    fn partial_json_updates_preview_without_failing() {
        let mut card = started_card();
        card.apply(token("{\"title\":\"X\"", false));
        assert_eq!(card.preview(), None);
        card.apply(token("{\"title\":\"X\"}", false));
        assert_eq!(card.preview(), Some("{\n  \"title\": \"X\"\n}"));
        assert_eq!(card.view().preview.as_deref(), card.preview());
        assert!(card.loading());
        assert_eq!(card.error(), None);
    }

    #[test]
    fn unparseable_done_token_fails_with_parse_error() {
        let mut card = started_card();
        let outcome = card.apply(token("Some preamble text without any JSON", true));
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(card.error(), Some(PARSE_FAILURE_MESSAGE));
        assert_eq!(card.failure_kind(), Some(FailureKind::Parse));
        assert!(!card.loading());
    }

    #[test]
    fn error_frame_fails_card_with_backend_message() {
        let mut card = started_card();
        card.apply(decode_frame(r#"{"type":"error","error":"rate limited"}"#));
        assert_eq!(card.error(), Some("rate limited"));
        assert_eq!(card.data(), None);
        assert!(!card.loading());
    }

    #[test]
    fn final_payload_bypasses_token_buffer() {
        let mut card = started_card();
        card.apply(token("ignored text", false));
        let outcome = card.apply(decode_frame(
            r#"{"response":{"badge_name":"Intro to Python","badge_description":"Covers basics","criteria":{"narrative":"Complete 3 exercises"}}}"#,
        ));
        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(
            card.data(),
            Some(&BadgeSuggestion::new(
                "Intro to Python",
                "Covers basics",
                "Complete 3 exercises"
            ))
        );
    }

    #[test]
    fn progress_records_percent_and_status_text() {
        let mut card = started_card();
        card.apply(StreamEvent::Progress { percent: 40.0 });
        assert_eq!(card.progress(), Some(40.0));
        assert_eq!(card.status_text(), Some("Generating (40%)"));
        assert_eq!(card.status(), &CardStatus::Streaming);
    }

    #[test]
    fn complete_without_payload_is_an_unexpected_end() {
        let mut card = started_card();
        card.apply(StreamEvent::Start);
        card.apply(token("partial", false));
        assert_eq!(card.apply(StreamEvent::Complete), Outcome::Failed);
        assert_eq!(card.failure_kind(), Some(FailureKind::UnexpectedEnd));
        assert_eq!(card.end_of_stream(), Outcome::Ignored);
    }

    #[test]
    fn terminal_cards_ignore_further_events() {
        let mut card = started_card();
        card.apply(decode_frame(r#"{"title":"X","description":"Y","criteria":"Z"}"#));
        let snapshot = card.clone();
        for event in [
            StreamEvent::Error {
                message: "late".into(),
            },
            token("{\"title\":\"other\"}", true),
            StreamEvent::FinalPayload {
                raw: json!({"title": "other"}),
            },
            StreamEvent::Complete,
        ] {
            assert_eq!(card.apply(event), Outcome::Ignored);
        }
        assert_eq!(card.fail(FailureKind::Timeout, "late"), Outcome::Ignored);
        assert_eq!(card.cancel(), Outcome::Ignored);
        assert_eq!(card, snapshot);
    }

    #[test]
    fn cancel_stops_an_in_flight_card() {
        let mut card = started_card();
        card.apply(StreamEvent::Start);
        assert_eq!(card.cancel(), Outcome::Cancelled);
        assert_eq!(card.status(), &CardStatus::Cancelled);
        assert!(!card.loading());
        assert_eq!(card.error(), None);
    }

    #[test]
    fn begin_resets_a_terminal_card() {
        let mut card = started_card();
        card.apply(token("oops", true));
        assert!(card.error().is_some());
        card.begin();
        assert_eq!(card.status(), &CardStatus::Connecting);
        assert_eq!(card.raw_streaming_content(), None);
        assert!(!card.streaming_started());
    }

    #[test]
    fn view_uses_camel_case_field_names() {
        let mut card = started_card();
        card.apply(token("Hi", false));
        let value = serde_json::to_value(card.view()).expect("serialize view");
        assert_eq!(value["rawStreamingContent"], json!("Hi"));
        assert_eq!(value["streamingStarted"], json!(true));
        assert_eq!(value["loading"], json!(true));
        assert_eq!(value["status"], json!("streaming"));
    }
}
