//! Error taxonomy for the token codec.
//!
//! Every variant is terminal: retrying a failed validation cannot succeed
//! without a different key or a different token. Display strings never
//! include key bytes, sub-keys, plaintext, or token contents.

use thiserror::Error;

use crate::key::KEY_LEN;

/// Errors produced by [`Codec`](crate::Codec) and its supporting layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The secret key is not exactly [`KEY_LEN`] bytes.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// The textual form of a key is not valid URL-safe base64.
    #[error("invalid key encoding")]
    InvalidKeyEncoding,

    /// The token is not valid transport base64, or is shorter than the
    /// smallest token the format can produce.
    #[error("malformed token")]
    MalformedToken,

    /// The recomputed integrity tag does not match the presented one.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is authentic but carries a version this codec does not speak.
    #[error("unsupported token version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// The token is authentic but older than the caller's TTL allows.
    #[error("token has expired")]
    TokenExpired,

    /// The token is authentic and fresh but its plaintext padding is invalid.
    #[error("invalid ciphertext padding")]
    PaddingError,

    /// The operating system random source failed to produce bytes.
    #[error("random source unavailable")]
    EntropyUnavailable,

    /// The system clock reads earlier than the Unix epoch.
    #[error("system clock unavailable")]
    ClockUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_are_stable() {
        assert_eq!(CodecError::MalformedToken.to_string(), "malformed token");
        assert_eq!(
            CodecError::InvalidSignature.to_string(),
            "invalid token signature"
        );
        assert_eq!(CodecError::TokenExpired.to_string(), "token has expired");
    }

    #[test]
    fn key_length_error_reports_sizes() {
        let e = CodecError::InvalidKeyLength { actual: 16 };
        let msg = e.to_string();
        assert!(msg.contains("32"));
        assert!(msg.contains("16"));
    }

    #[test]
    fn version_is_rendered_as_hex() {
        assert_eq!(
            CodecError::UnsupportedVersion(0x81).to_string(),
            "unsupported token version: 0x81"
        );
    }
}
