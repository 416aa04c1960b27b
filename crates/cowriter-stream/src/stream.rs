/// Normalized events decoded from a generation stream.
///
/// Upstream payloads come in several shapes; the frame decoder folds all of
/// them into this one type before the card reconciler sees them.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The stream was opened. Carries no payload.
    Start,
    /// One generation token.
    ///
    /// `accumulated` is the backend's full running text and replaces the
    /// buffered text outright. `fragment` is the newest piece of it.
    Token {
        fragment: String,
        accumulated: String,
        done: bool,
    },
    /// Backend-reported progress.
    Progress { percent: f64 },
    /// Complete structured response; authoritative and terminal.
    FinalPayload { raw: serde_json::Value },
    /// Backend-reported failure; terminal.
    Error { message: String },
    /// End-of-stream sentinel.
    Complete,
}

impl StreamEvent {
    /// Returns `true` for events after which no further frames are read.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::FinalPayload { .. } | Self::Error { .. } | Self::Complete
        )
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Token { .. } => "token",
            Self::Progress { .. } => "progress",
            Self::FinalPayload { .. } => "final_payload",
            Self::Error { .. } => "error",
            Self::Complete => "complete",
        }
    }
}
