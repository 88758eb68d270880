//! Error types for the `sse` crate.
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by the broadcast engine.
/// `error_kind` tells callers how to react (a `Closed` listener is simply dropped,
/// a `NotRegistered` pairing is a caller bug and should propagate), while `source`
/// keeps the underlying error when one exists.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The client is closed: enqueue, subscribe or a second close was attempted.
    Closed,
    /// The client and event source have no existing listener relationship.
    NotRegistered,
    /// A frame was constructed with an empty `data` payload.
    EmptyPayload,
    /// Wire text could not be parsed back into a frame.
    MalformedFrame(String),
    /// A payload failed to serialize to JSON.
    Serialization,
}

impl Error {
    pub fn closed() -> Self {
        Self::from(ErrorKind::Closed)
    }

    pub fn not_registered() -> Self {
        Self::from(ErrorKind::NotRegistered)
    }

    pub fn is_closed(&self) -> bool {
        self.error_kind == ErrorKind::Closed
    }
}

impl From<ErrorKind> for Error {
    fn from(error_kind: ErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Closed => write!(f, "Connection is closed"),
            ErrorKind::NotRegistered => write!(f, "Client is not registered with event source"),
            ErrorKind::EmptyPayload => write!(f, "Frame data must not be empty"),
            ErrorKind::MalformedFrame(reason) => write!(f, "Malformed frame: {reason}"),
            ErrorKind::Serialization => write!(f, "Failed to serialize SSE payload"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
