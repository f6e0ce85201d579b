//! Byte layout and transport encoding of tokens.
//!
//! # Wire format
//!
//! ```text
//! offset  size  field
//! 0       1     version (0x80)
//! 1       8     timestamp, big-endian seconds since the Unix epoch
//! 9       16    IV
//! 25      N     ciphertext, N a positive multiple of 16
//! 25+N    32    HMAC-SHA256 over bytes [0, 25+N)
//! ```
//!
//! The whole byte string is carried as URL-safe base64 with no `=` padding.
//! Padding is tolerated on input. Nothing in this module touches a key.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

use crate::cipher::BLOCK_LEN;
use crate::error::CodecError;

/// The only token version this codec produces or accepts.
pub const VERSION: u8 = 0x80;

/// Byte length of the IV field.
pub const IV_LEN: usize = BLOCK_LEN;

/// Byte length of the integrity tag.
pub const TAG_LEN: usize = 32;

/// Bytes before the ciphertext: version, timestamp, IV.
pub const HEADER_LEN: usize = 1 + 8 + IV_LEN;

/// Smallest decodable token: header, one cipher block, tag.
pub const MIN_TOKEN_LEN: usize = HEADER_LEN + BLOCK_LEN + TAG_LEN;

const TRANSPORT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Structural view of a token. Carries no guarantee of authenticity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub version: u8,
    pub timestamp: u64,
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl RawToken {
    /// The signed portion: version ‖ timestamp ‖ iv ‖ ciphertext.
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.push(self.version);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Full wire bytes: message followed by tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.message_bytes();
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse a message (everything but the tag) and pair it with `tag`.
    pub fn from_parts(message: &[u8], tag: [u8; TAG_LEN]) -> Result<Self, CodecError> {
        if message.len() < HEADER_LEN {
            return Err(CodecError::MalformedToken);
        }
        let (header, ciphertext) = message.split_at(HEADER_LEN);
        let version = header[0];
        let timestamp = u64::from_be_bytes(
            header[1..9]
                .try_into()
                .map_err(|_| CodecError::MalformedToken)?,
        );
        let iv: [u8; IV_LEN] = header[9..HEADER_LEN]
            .try_into()
            .map_err(|_| CodecError::MalformedToken)?;
        Ok(Self {
            version,
            timestamp,
            iv,
            ciphertext: ciphertext.to_vec(),
            tag,
        })
    }
}

/// Transport-decode `text` to raw token bytes, enforcing the minimum length.
///
/// # Errors
///
/// Returns [`CodecError::MalformedToken`] on invalid base64 or if fewer than
/// [`MIN_TOKEN_LEN`] bytes result.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, CodecError> {
    let bytes = TRANSPORT
        .decode(text)
        .map_err(|_| CodecError::MalformedToken)?;
    if bytes.len() < MIN_TOKEN_LEN {
        return Err(CodecError::MalformedToken);
    }
    Ok(bytes)
}

/// Transport-encode raw token bytes.
pub fn encode_bytes(bytes: &[u8]) -> String {
    TRANSPORT.encode(bytes)
}

/// Split decoded token bytes into `(message, tag)`.
///
/// # Errors
///
/// Returns [`CodecError::MalformedToken`] if `bytes` is shorter than [`MIN_TOKEN_LEN`].
pub fn split_signed(bytes: &[u8]) -> Result<(&[u8], [u8; TAG_LEN]), CodecError> {
    if bytes.len() < MIN_TOKEN_LEN {
        return Err(CodecError::MalformedToken);
    }
    let (message, tag) = bytes.split_at(bytes.len() - TAG_LEN);
    let tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| CodecError::MalformedToken)?;
    Ok((message, tag))
}

/// Encode a token to its transport string.
pub fn encode(token: &RawToken) -> String {
    encode_bytes(&token.to_bytes())
}

/// Decode a transport string into its structural fields.
///
/// # Errors
///
/// Returns [`CodecError::MalformedToken`] on invalid base64 or underflow.
pub fn decode(text: &str) -> Result<RawToken, CodecError> {
    let bytes = decode_bytes(text)?;
    let (message, tag) = split_signed(&bytes)?;
    RawToken::from_parts(message, tag)
}
