//! Closed error taxonomy returned across the dispatch boundary
//!
//! Every lower-level error in this crate is converted into a [`Failure`]
//! carrying one of the eight stable [`ErrorCode`] values before it reaches a
//! caller. The codes are part of the wire contract: new failure modes must be
//! mapped onto an existing code, and messages are bounded in length and never
//! carry raw cryptographic values.

use serde::{Deserialize, Serialize};

/// Upper bound on the `message` field of a [`Failure`].
pub const MAX_MESSAGE_BYTES: usize = 256;

/// The closed taxonomy observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Envelope structurally invalid; canonical-encoding or schema violation;
    /// malformed field element or curve point; duplicate or missing VK.
    #[serde(rename = "BAD_ARGUMENTS")]
    BadArguments,
    /// `circuit_id` not present in the allowlist.
    #[serde(rename = "NOT_ALLOWED")]
    NotAllowed,
    /// Proof bytes, VK bytes, public-input count, or opening count exceed the
    /// configured ceiling for the kind.
    #[serde(rename = "LIMIT_EXCEEDED")]
    LimitExceeded,
    /// `vk_ref` unresolved; hash mismatch between embedded and registered VK;
    /// record signature check failed.
    #[serde(rename = "REGISTRY_ERROR")]
    RegistryError,
    /// Operational misconfiguration (missing policy tables, unreadable state).
    #[serde(rename = "IMPORT_FAILURE")]
    ImportFailure,
    /// Toolchain-specific shape could not be normalized to verifier inputs.
    #[serde(rename = "ADAPTER_ERROR")]
    AdapterError,
    /// All structural checks passed; the cryptographic equation is false.
    #[serde(rename = "VERIFY_FAILED")]
    VerifyFailed,
    /// Any uncategorized failure. Logged with high severity; must be rare.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    /// Stable wire spelling of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadArguments => "BAD_ARGUMENTS",
            ErrorCode::NotAllowed => "NOT_ALLOWED",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::RegistryError => "REGISTRY_ERROR",
            ErrorCode::ImportFailure => "IMPORT_FAILURE",
            ErrorCode::AdapterError => "ADAPTER_ERROR",
            ErrorCode::VerifyFailed => "VERIFY_FAILED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized failure: stable code plus a bounded, human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Failure {
    /// Taxonomy code.
    pub code: ErrorCode,
    /// Bounded diagnostic text (never raw cryptographic values).
    pub message: String,
}

impl Failure {
    /// Build a failure, truncating the message to [`MAX_MESSAGE_BYTES`].
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.len() > MAX_MESSAGE_BYTES {
            // Truncate on a char boundary so the result stays valid UTF-8.
            let mut end = MAX_MESSAGE_BYTES;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Self { code, message }
    }

    /// `BAD_ARGUMENTS` shorthand.
    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadArguments, message)
    }

    /// `VERIFY_FAILED` shorthand.
    pub fn verify_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::VerifyFailed, message)
    }

    /// `REGISTRY_ERROR` shorthand.
    pub fn registry_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RegistryError, message)
    }
}
