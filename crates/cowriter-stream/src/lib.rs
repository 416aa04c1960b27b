//! Streaming core for drafting credential badges from course content.
//!
//! A generation request is posted to a streaming endpoint; the response is
//! framed, decoded into [`StreamEvent`]s and folded into a [`SuggestionCard`]
//! whose terminal state is either a [`BadgeSuggestion`], a failure or a
//! cancellation.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cowriter_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), GeneratorError> {
//! let generator = Generator::builder()
//!     .source(Arc::new(HttpEventSource::from_env()?))
//!     .build()?;
//!
//! let mut handle = generator
//!     .start(GenerationRequest::new("Week 1: ownership and borrowing"))
//!     .await?;
//! while let Some(card) = handle.next_update().await {
//!     println!("{}", card.status().label());
//! }
//! let card = handle.finish().await?;
//! if let Some(suggestion) = card.data() {
//!     println!("{}", suggestion.title());
//! }
//! # Ok(())
//! # }
//! ```

/// Token buffer for a single generation.
pub mod accumulator;
/// Suggestion card state machine.
pub mod card;
/// Persistence and notification collaborators.
pub mod collaborators;
/// Endpoint and runtime configuration.
pub mod config;
/// Public error types.
pub mod errors;
/// JSON extraction from generated text.
pub mod extract;
/// Generator entry point, per-card tasks and cancellation.
pub mod generator;
/// Mapping of backend payload shapes onto badge suggestions.
pub mod mapper;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Side effects around card transitions.
pub mod reconciler;
/// Generation request body.
pub mod request;
/// Event source contract and implementations.
pub mod source;
/// Normalized stream events.
pub mod stream;
/// Badge suggestion model.
pub mod suggestion;
/// Event-stream framing and frame decoding.
pub mod transport;

pub use accumulator::TokenAccumulator;
pub use card::{CardStatus, CardView, FailureKind, Outcome, SuggestionCard};
pub use collaborators::{
    FileStore, MemoryStore, Notification, NotificationKind, Notifier, ResponseStore,
    ResponseStoreExt, TracingNotifier,
};
pub use config::{ClientConfig, GenerationOptions};
pub use errors::{GeneratorError, StoreError, StreamError};
pub use extract::{Extraction, extract_json};
pub use generator::{CancelHandle, GenerationHandle, Generator, GeneratorBuilder};
pub use mapper::map_suggestion;
pub use observability::{
    ConsoleStream, LogTarget, ObservabilityConfig, init_observability, init_observability_with,
};
pub use reconciler::CardReconciler;
pub use request::{GenerationConfig, GenerationRequest, ImageGenerationConfig};
pub use source::{EventSource, EventStream, HttpEventSource, RecordedSource};
pub use stream::StreamEvent;
pub use suggestion::{BadgeSuggestion, Skill, TokenMetrics};
pub use transport::{FrameReader, decode_frame};
