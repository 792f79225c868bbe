//! Error types shared by the codec, the named-value layer and the dispatch table.

use thiserror::Error;

/// Failure while reading typed values from a bit stream or a named-value record.
///
/// On the wire every variant means the stream cursor can no longer be trusted,
/// so the caller must treat it as a corrupted connection buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of stream: needed {needed} bits, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("string length {length} exceeds the maximum of {max}")]
    StringTooLong { length: usize, max: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid {kind} value {value}")]
    InvalidEnum { kind: &'static str, value: u64 },

    #[error("collection length {length} exceeds the maximum of {max}")]
    TooManyElements { length: usize, max: usize },

    #[error("missing named value `{0}`")]
    MissingValue(String),

    #[error("named value `{name}` could not be parsed from `{text}`")]
    InvalidValue { name: String, text: String },
}

/// Startup-time failure while building a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("message id width of {0} bits is not supported (1..=16)")]
    InvalidIdWidth(u32),

    #[error("message id {id} for `{handler}` does not fit in {bits} bits")]
    IdOutOfRange {
        id: u32,
        bits: u32,
        handler: &'static str,
    },

    #[error("message id {id} registered twice (`{existing}` and `{duplicate}`)")]
    DuplicateId {
        id: u32,
        existing: &'static str,
        duplicate: &'static str,
    },
}

/// Outcome of a failed message handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A field could not be read; the rest of the receive buffer is unusable.
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),

    /// The packet was fully read but could not be acted upon.
    #[error("{0}")]
    Rejected(String),
}

impl HandlerError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        HandlerError::Rejected(reason.into())
    }

    /// True when the failure leaves the read cursor in an indeterminate state.
    pub fn is_framing(&self) -> bool {
        matches!(self, HandlerError::Decode(_))
    }
}
