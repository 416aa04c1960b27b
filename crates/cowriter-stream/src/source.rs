use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{GeneratorError, StreamError};
use crate::request::GenerationRequest;
use crate::stream::StreamEvent;
use crate::transport::{FrameReader, decode_frame};

/// Decoded events produced by an [`EventSource`].
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, StreamError>> + Send + 'static>>;

type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<Bytes, StreamError>> + Send + 'static>>;

/// Turns a generation request into a stream of decoded events.
///
/// Implementations yield [`StreamEvent::Start`] once the stream is open and
/// stop after the first terminal event.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Opens a stream for `request`.
    async fn open(&self, request: &GenerationRequest) -> Result<EventStream, StreamError>;
}

/// Event source backed by the streaming generation endpoint.
pub struct HttpEventSource {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpEventSource {
    /// Creates a source from explicit client configuration.
    pub fn new(config: ClientConfig) -> Result<Self, GeneratorError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GeneratorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a source from `COWRITER_*` environment variables.
    pub fn from_env() -> Result<Self, GeneratorError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl EventSource for HttpEventSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: &GenerationRequest) -> Result<EventStream, StreamError> {
        let url = self.config.generate_url();
        debug!(url = %url, skills = request.enable_skill_extraction, "opening generation stream");

        let mut http_req = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);
        if let Some(api_key) = &self.config.api_key {
            http_req = http_req.bearer_auth(api_key);
        }

        let response = http_req.send().await.map_err(|e| {
            StreamError::connection(
                format!("generation request failed: {e}"),
                e.status().map(|s| s.as_u16()),
            )
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::connection(
                format!("generation request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !is_event_stream(content_type) {
                return Err(StreamError::protocol(format!(
                    "generation endpoint answered with {content_type:?} instead of text/event-stream"
                )));
            }
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| StreamError::transport(format!("stream read failed: {e}")))
        }));
        Ok(decode_byte_stream(bytes))
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("text/event-stream"))
}

/// Event source that replays a recorded response body.
///
/// The body goes through the same framing and decoding as a live response,
/// which makes it useful for tests and offline replays.
#[derive(Clone, Debug)]
pub struct RecordedSource {
    chunks: Vec<Bytes>,
}

impl RecordedSource {
    /// Replays `body` as a single chunk.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            chunks: vec![body.into()],
        }
    }

    /// Replays `body` split into chunks of at most `chunk_size` bytes.
    pub fn chunked(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        let body = body.into();
        let size = chunk_size.max(1);
        let chunks = (0..body.len())
            .step_by(size)
            .map(|start| body.slice(start..(start + size).min(body.len())))
            .collect();
        Self { chunks }
    }

    /// Replays the given chunks in order.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait::async_trait]
impl EventSource for RecordedSource {
    fn name(&self) -> &str {
        "recorded"
    }

    async fn open(&self, _request: &GenerationRequest) -> Result<EventStream, StreamError> {
        let chunks: Vec<Result<Bytes, StreamError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(decode_byte_stream(Box::pin(stream::iter(chunks))))
    }
}

/// Frames and decodes `bytes`, yielding `Start` first and stopping after the
/// first terminal event.
fn decode_byte_stream(bytes: ByteStream) -> EventStream {
    struct State {
        bytes: ByteStream,
        reader: FrameReader,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    Box::pin(stream::try_unfold(
        State {
            bytes,
            reader: FrameReader::new(),
            pending: VecDeque::from([StreamEvent::Start]),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for payload in state.reader.push_chunk(&chunk) {
                            let event = decode_frame(&payload);
                            debug!(event = event.kind(), "decoded frame");
                            let terminal = event.is_terminal();
                            state.pending.push_back(event);
                            if terminal {
                                state.done = true;
                                break;
                            }
                        }
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        let frames = std::mem::take(&mut state.reader).finish();
                        debug!(frames, "event stream closed");
                        state.done = true;
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt as _, TryStreamExt as _};

    const BODY: &str = concat!(
        ": keep-alive\n",
        "data: {\"type\":\"progress\",\"progress\":40}\n",
        "data: {\"type\":\"token\",\"content\":\"{\\\"title\\\":\",\"accumulated\":\"{\\\"title\\\":\",\"done\":false}\n",
        "data: {\"title\":\"Rust\",\"description\":\"d\",\"criteria\":\"c\"}\n",
        "data: {\"type\":\"progress\",\"progress\":99}\n",
        "data: [DONE]\n",
    );

    async fn collect(source: &dyn EventSource) -> Vec<StreamEvent> {
        source
            .open(&GenerationRequest::new("course"))
            .await
            .expect("open")
            .try_collect()
            .await
            .expect("events")
    }

    fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::kind).collect()
    }

    #[tokio::test]
    async fn recorded_source_starts_then_stops_after_terminal_event() {
        let events = collect(&RecordedSource::new(BODY)).await;
        assert_eq!(
            kinds(&events),
            vec!["start", "progress", "token", "final_payload"]
        );
    }

    #[tokio::test]
    async fn chunked_replay_matches_single_chunk_replay() {
        let whole = collect(&RecordedSource::new(BODY)).await;
        for size in [1, 3, 7, 64] {
            let source = RecordedSource::chunked(BODY, size);
            assert_eq!(source.chunk_count(), BODY.len().div_ceil(size));
            assert_eq!(collect(&source).await, whole, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn stream_without_terminal_event_ends_quietly() {
        let events = collect(&RecordedSource::from_chunks([
            "data: {\"type\":\"progress\",\"progress\":10}\n",
            "data: {\"type\":\"tok",
        ]))
        .await;
        assert_eq!(kinds(&events), vec!["start", "progress"]);
    }

    #[tokio::test]
    async fn read_errors_surface_after_buffered_events() {
        let bytes: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"progress\",\"progress\":5}\n")),
            Err(StreamError::transport("connection reset")),
        ]));
        let mut events = decode_byte_stream(bytes);
        assert_eq!(events.next().await, Some(Ok(StreamEvent::Start)));
        assert_eq!(
            events.next().await,
            Some(Ok(StreamEvent::Progress { percent: 5.0 }))
        );
        assert_eq!(
            events.next().await,
            Some(Err(StreamError::transport("connection reset")))
        );
    }

    #[test]
    fn event_stream_media_type_ignores_case_and_parameters() {
        assert!(is_event_stream("text/event-stream"));
        assert!(is_event_stream("Text/Event-Stream; charset=utf-8"));
        assert!(!is_event_stream("application/json"));
        assert!(!is_event_stream(""));
    }

    #[test]
    fn http_source_rejects_invalid_config() {
        assert!(matches!(
            HttpEventSource::new(ClientConfig::new("localhost:8000")),
            Err(GeneratorError::Config(_))
        ));
        let source = HttpEventSource::new(ClientConfig::new("http://localhost:8000"))
            .expect("source");
        assert_eq!(source.name(), "http");
        assert_eq!(
            source.config().generate_url(),
            "http://localhost:8000/generate-stream"
        );
    }
}
