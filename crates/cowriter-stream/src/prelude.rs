//! Common imports for typical generator usage.
pub use crate::{
    BadgeSuggestion, CancelHandle, CardStatus, ClientConfig, FailureKind, GenerationConfig,
    GenerationHandle, GenerationOptions, GenerationRequest, Generator, GeneratorError,
    HttpEventSource, RecordedSource, StreamEvent, SuggestionCard,
};
