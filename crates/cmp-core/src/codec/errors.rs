use thiserror::Error;

/// Consent string decoding failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("consent string is empty")]
    Empty,

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("unsupported consent string version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("truncated input: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid timestamp: {millis}")]
    InvalidTimestamp { millis: i64 },

    #[error("invalid ATT status code {code}")]
    InvalidAttStatus { code: u8 },

    #[error("invalid identifier at offset {offset}: {reason}")]
    InvalidId { offset: usize, reason: String },

    #[error("invalid state byte {byte:#04x} for {id}")]
    InvalidState { id: String, byte: u8 },

    #[error("identifiers not in canonical order at {id}")]
    NonCanonicalOrder { id: String },

    #[error("{count} trailing bytes after payload")]
    TrailingBytes { count: usize },
}

/// Consent string encoding failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot encode record version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("identifier exceeds 255 bytes: {id}")]
    IdTooLong { id: String },

    #[error("empty identifier")]
    EmptyId,

    #[error("too many {kind} entries: {count}")]
    TooManyEntries { kind: &'static str, count: usize },

    #[error("vendor {id} is pinned but not rejected")]
    InconsistentPin { id: String },
}
