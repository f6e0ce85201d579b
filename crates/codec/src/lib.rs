//! Authenticated symmetric token codec.
//!
//! Turns arbitrary bytes into compact, self-describing, tamper-evident tokens
//! under a single 32-byte shared secret, and back again.
//!
//! - [`cipher`]: AES-128-CBC with PKCS#7 padding.
//! - [`token`]: the versioned wire layout and its URL-safe base64 transport.
//! - [`verify`]: HMAC-SHA256 tags, version and TTL checks.
//! - [`Codec`] / [`MultiCodec`]: the encrypt and decrypt pipelines.
//!
//! # Invariants
//!
//! - The tag is checked before any decryption is attempted.
//! - Key material and plaintext never appear in errors, logs, or `Debug` output.
//! - No global state; a codec is rebuilt, not mutated, when the key changes.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod key;
pub mod multi;
pub mod token;
pub mod verify;

pub use codec::Codec;
pub use error::CodecError;
pub use key::{SecretKey, KEY_LEN};
pub use multi::MultiCodec;
