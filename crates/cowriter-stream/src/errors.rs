use crate::card::FailureKind;

/// Errors raised by an event source while connecting or streaming, before
/// they are folded into a card's terminal state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The generation endpoint could not be reached or answered with a
    /// non-success status.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        status_code: Option<u16>,
    },
    /// Reading the response body failed mid-stream.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The response violated the event-stream contract.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl StreamError {
    /// Creates a connection-level error.
    pub fn connection(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Connection {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Transport { message }
            | Self::Protocol { message } => message,
        }
    }

    /// Returns the HTTP status when the endpoint rejected the request.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Connection { status_code, .. } => *status_code,
            _ => None,
        }
    }

    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Connection { .. } | Self::Transport { .. } => FailureKind::Connection,
            Self::Protocol { .. } => FailureKind::Protocol,
        }
    }
}

/// Errors raised by a [`ResponseStore`](crate::collaborators::ResponseStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),
    #[error("store serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Serialization(value.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Io(value.to_string())
    }
}

/// Top-level error type for the public generation API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    /// Invalid client or generator configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid generation request.
    #[error("validation error: {0}")]
    Validation(String),
    /// Event source failure surfaced outside a card.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// Persistence collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Requested card is not tracked by the generator.
    #[error("card not found: {card_id}")]
    CardNotFound { card_id: uuid::Uuid },
    /// Internal invariant violation (for example a panicked card task).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl GeneratorError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
