//! [`MultiCodec`]: one current key for encryption, older keys accepted on decrypt.

use tracing::debug;

use crate::codec::{unix_now, Codec};
use crate::error::CodecError;

/// A primary [`Codec`] plus fallbacks tried in order when decrypting.
#[derive(Clone, Debug)]
pub struct MultiCodec {
    primary: Codec,
    fallbacks: Vec<Codec>,
}

impl MultiCodec {
    pub fn new(primary: Codec, fallbacks: Vec<Codec>) -> Self {
        Self { primary, fallbacks }
    }

    /// The codec used for every new token.
    pub fn primary(&self) -> &Codec {
        &self.primary
    }

    /// Number of keys consulted on decrypt, primary included.
    pub fn key_count(&self) -> usize {
        1 + self.fallbacks.len()
    }

    /// Encrypt under the primary key.
    ///
    /// # Errors
    ///
    /// As [`Codec::encrypt`].
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        self.primary.encrypt(plaintext)
    }

    /// Decrypt under whichever key authenticates the token.
    ///
    /// # Errors
    ///
    /// [`CodecError::InvalidSignature`] if no key authenticates the token;
    /// otherwise the error reported by the first key that did.
    pub fn decrypt(&self, token: &str, ttl_seconds: i64) -> Result<Vec<u8>, CodecError> {
        self.decrypt_at(token, ttl_seconds, unix_now()?)
    }

    /// [`MultiCodec::decrypt`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// As [`MultiCodec::decrypt`].
    pub fn decrypt_at(
        &self,
        token: &str,
        ttl_seconds: i64,
        now: u64,
    ) -> Result<Vec<u8>, CodecError> {
        self.open(token, ttl_seconds, now)
            .map(|(_, plaintext)| plaintext)
    }

    /// Re-encrypt `token` under the primary key, keeping its original timestamp.
    ///
    /// # Errors
    ///
    /// Any decrypt error (no TTL is applied) or [`CodecError::EntropyUnavailable`].
    pub fn rotate(&self, token: &str) -> Result<String, CodecError> {
        let (timestamp, plaintext) = self.open(token, 0, 0)?;
        self.primary.encrypt_at(&plaintext, timestamp)
    }

    fn open(&self, token: &str, ttl_seconds: i64, now: u64) -> Result<(u64, Vec<u8>), CodecError> {
        for (index, codec) in self.keys().enumerate() {
            match codec.open(token, ttl_seconds, now) {
                Ok(opened) => {
                    if index > 0 {
                        debug!(key_index = index, "token opened with fallback key");
                    }
                    return Ok(opened);
                }
                // Wrong key: try the next one.
                Err(CodecError::InvalidSignature) => continue,
                // Authenticated under this key, or structurally broken for every key.
                Err(e) => return Err(e),
            }
        }
        Err(CodecError::InvalidSignature)
    }

    fn keys(&self) -> impl Iterator<Item = &Codec> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }
}

impl From<Codec> for MultiCodec {
    fn from(primary: Codec) -> Self {
        Self::new(primary, Vec::new())
    }
}
