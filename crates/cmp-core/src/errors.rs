//! Error types for the consent engine.
//!
//! Every failure reaches the host as a rejected result carrying a stable
//! machine code (`code()`) and a human-readable message (`Display`).

use crate::codec::DecodeError;
use std::fmt;

/// Which catalog namespace an identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Purpose,
    Vendor,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Purpose => write!(f, "purpose"),
            IdKind::Vendor => write!(f, "vendor"),
        }
    }
}

/// Stable error codes surfaced to the host.
pub mod codes {
    pub const E_INVALID_CONFIG: &str = "E_INVALID_CONFIG";
    pub const E_INVALID_STATUS: &str = "E_INVALID_STATUS";
    pub const E_UNKNOWN_ID: &str = "E_UNKNOWN_ID";
    pub const E_DECODE: &str = "E_DECODE";
    pub const E_IMPORT: &str = "E_IMPORT";
    pub const E_INVALID_RECORD: &str = "E_INVALID_RECORD";
    pub const E_NOT_CONFIGURED: &str = "E_NOT_CONFIGURED";
    pub const E_PRESENTATION: &str = "E_PRESENTATION";
}

/// Consent engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ConsentError {
    /// Malformed configuration object or engine config file.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// ATT status code outside the known range.
    #[error("invalid ATT status: {value} (expected 0..=3)")]
    InvalidStatus { value: i64 },

    /// Identifier not present in the catalog.
    #[error("unknown {kind} id: {id}")]
    UnknownId { kind: IdKind, id: String },

    /// Consent string could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Import rejected; the store is untouched.
    #[error("import failed: {source}")]
    Import {
        #[source]
        source: DecodeError,
    },

    /// Record is structurally inconsistent with the catalog.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// A URL config has not been set yet.
    #[error("engine not configured: set a URL config first")]
    NotConfigured,

    /// The UI collaborator failed to present the consent flow.
    #[error("presentation failed: {message}")]
    Presentation { message: String },
}

impl ConsentError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    pub fn unknown_purpose(id: impl Into<String>) -> Self {
        Self::UnknownId {
            kind: IdKind::Purpose,
            id: id.into(),
        }
    }

    pub fn unknown_vendor(id: impl Into<String>) -> Self {
        Self::UnknownId {
            kind: IdKind::Vendor,
            id: id.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => codes::E_INVALID_CONFIG,
            Self::InvalidStatus { .. } => codes::E_INVALID_STATUS,
            Self::UnknownId { .. } => codes::E_UNKNOWN_ID,
            Self::Decode(_) => codes::E_DECODE,
            Self::Import { .. } => codes::E_IMPORT,
            Self::InvalidRecord { .. } => codes::E_INVALID_RECORD,
            Self::NotConfigured => codes::E_NOT_CONFIGURED,
            Self::Presentation { .. } => codes::E_PRESENTATION,
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } | Self::NotConfigured => 2,
            _ => 1,
        }
    }
}

/// Result type for consent operations.
pub type ConsentResult<T> = Result<T, ConsentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            ConsentError::InvalidStatus { value: 9 }.code(),
            "E_INVALID_STATUS"
        );
        assert_eq!(ConsentError::unknown_vendor("v9").code(), "E_UNKNOWN_ID");
        assert_eq!(
            ConsentError::Import {
                source: DecodeError::UnsupportedVersion { version: 7 }
            }
            .code(),
            "E_IMPORT"
        );
        assert_eq!(ConsentError::NotConfigured.code(), "E_NOT_CONFIGURED");
    }

    #[test]
    fn test_unknown_id_message_names_kind() {
        let err = ConsentError::unknown_purpose("analytics");
        assert_eq!(err.to_string(), "unknown purpose id: analytics");
    }
}
