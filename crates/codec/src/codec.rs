//! [`Codec`]: encrypt bytes to a token, decrypt a token back to bytes.
//!
//! # Decrypt pipeline
//!
//! 1. transport-decode and length-check
//! 2. split the tag from the message
//! 3. verify the tag (constant time)
//! 4. check the version
//! 5. check freshness against the caller's TTL
//! 6. decrypt and unpad
//!
//! Step 6 is unreachable unless step 3 succeeded.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs::OsRng, RngCore};
use tracing::debug;

use crate::cipher::{decrypt_blocks, encrypt_blocks};
use crate::error::CodecError;
use crate::key::{CipherKey, SecretKey, SigningKey};
use crate::token::{self, RawToken, IV_LEN, TAG_LEN, VERSION};
use crate::verify::{check_freshness, check_version, sign, verify};

/// An immutable codec bound to one secret key.
///
/// Cheap to clone and safe to share across threads. Construct a new one to
/// change keys.
#[derive(Clone, Debug)]
pub struct Codec {
    signing: SigningKey,
    cipher: CipherKey,
}

impl Codec {
    /// Build a codec from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CodecError> {
        Ok(Self::from_key(&SecretKey::from_slice(key)?))
    }

    /// Build a codec from a [`SecretKey`].
    pub fn from_key(key: &SecretKey) -> Self {
        let (signing, cipher) = key.split();
        Self { signing, cipher }
    }

    /// Encrypt `plaintext` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EntropyUnavailable`] if no IV can be drawn, or
    /// [`CodecError::ClockUnavailable`] if the clock is before the epoch.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        self.encrypt_at(plaintext, unix_now()?)
    }

    /// Encrypt `plaintext` stamped with an explicit `timestamp`.
    ///
    /// The IV is still drawn fresh from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EntropyUnavailable`] if the random source fails.
    pub fn encrypt_at(&self, plaintext: &[u8], timestamp: u64) -> Result<String, CodecError> {
        let mut iv = [0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|_| CodecError::EntropyUnavailable)?;
        Ok(self.seal(plaintext, timestamp, iv))
    }

    /// Decrypt `token`, rejecting it if older than `ttl_seconds`.
    ///
    /// `ttl_seconds <= 0` disables the age check.
    ///
    /// # Errors
    ///
    /// [`CodecError::MalformedToken`], [`CodecError::InvalidSignature`],
    /// [`CodecError::UnsupportedVersion`], [`CodecError::TokenExpired`] or
    /// [`CodecError::PaddingError`], in pipeline order; plus
    /// [`CodecError::ClockUnavailable`] if the clock cannot be read.
    pub fn decrypt(&self, token: &str, ttl_seconds: i64) -> Result<Vec<u8>, CodecError> {
        self.decrypt_at(token, ttl_seconds, unix_now()?)
    }

    /// Decrypt `token` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// As [`Codec::decrypt`], minus the clock failure.
    pub fn decrypt_at(
        &self,
        token: &str,
        ttl_seconds: i64,
        now: u64,
    ) -> Result<Vec<u8>, CodecError> {
        self.open(token, ttl_seconds, now).map(|(_, plaintext)| plaintext)
    }

    /// Return the timestamp embedded in an authentic, supported token.
    ///
    /// The ciphertext is not decrypted and no TTL is applied.
    ///
    /// # Errors
    ///
    /// [`CodecError::MalformedToken`], [`CodecError::InvalidSignature`] or
    /// [`CodecError::UnsupportedVersion`].
    pub fn extract_timestamp(&self, token: &str) -> Result<u64, CodecError> {
        let raw = self.authenticate(token)?;
        Ok(raw.timestamp)
    }

    /// Run the full decrypt pipeline, returning the embedded timestamp too.
    pub(crate) fn open(
        &self,
        token: &str,
        ttl_seconds: i64,
        now: u64,
    ) -> Result<(u64, Vec<u8>), CodecError> {
        let raw = self.authenticate(token)?;

        if !check_freshness(raw.timestamp, ttl_seconds, now) {
            debug!(ttl_seconds, "token rejected: expired");
            return Err(CodecError::TokenExpired);
        }

        let plaintext = decrypt_blocks(&self.cipher, &raw.iv, &raw.ciphertext).map_err(|_| {
            debug!("token rejected: invalid padding");
            CodecError::PaddingError
        })?;

        Ok((raw.timestamp, plaintext))
    }

    /// Steps 1 through 4: decode, verify the tag, then parse and check the version.
    fn authenticate(&self, token: &str) -> Result<RawToken, CodecError> {
        let bytes = token::decode_bytes(token).map_err(|e| {
            debug!("token rejected: malformed");
            e
        })?;
        let (message, tag) = token::split_signed(&bytes)?;

        if !verify(&self.signing, message, &tag) {
            debug!("token rejected: signature mismatch");
            return Err(CodecError::InvalidSignature);
        }

        let raw = RawToken::from_parts(message, tag)?;
        if !check_version(raw.version) {
            debug!(version = raw.version, "token rejected: unsupported version");
            return Err(CodecError::UnsupportedVersion(raw.version));
        }
        Ok(raw)
    }

    /// Assemble, sign and encode a token from explicit parts.
    pub(crate) fn seal(&self, plaintext: &[u8], timestamp: u64, iv: [u8; IV_LEN]) -> String {
        let mut raw = RawToken {
            version: VERSION,
            timestamp,
            iv,
            ciphertext: encrypt_blocks(&self.cipher, &iv, plaintext),
            tag: [0u8; TAG_LEN],
        };
        raw.tag = sign(&self.signing, &raw.message_bytes());
        token::encode(&raw)
    }
}

/// Seconds since the Unix epoch according to the system clock.
pub(crate) fn unix_now() -> Result<u64, CodecError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| CodecError::ClockUnavailable)
}
