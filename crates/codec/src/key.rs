//! Secret key handling and the deterministic split into purpose-bound sub-keys.
//!
//! A [`SecretKey`] is 32 bytes. The first half keys HMAC-SHA256 and only
//! ever lives inside a [`SigningKey`]; the second half keys AES-128 and only
//! ever lives inside a [`CipherKey`]. The two types are not interchangeable.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use hmac::{digest::Key, Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CodecError;

/// Byte length of a full secret key.
pub const KEY_LEN: usize = 32;

/// Byte length of each sub-key.
pub const SUB_KEY_LEN: usize = 16;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Textual key form: URL-safe alphabet, `=` padding written, padding optional on read.
const KEY_TEXT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A 32-byte shared secret. Zeroed on drop.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Copy key material out of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] unless `bytes` is exactly [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidKeyLength {
                actual: bytes.len(),
            })?;
        Ok(Self(Zeroizing::new(arr)))
    }

    /// Generate a fresh key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EntropyUnavailable`] if the random source fails.
    pub fn generate() -> Result<Self, CodecError> {
        let mut buf = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut buf[..])
            .map_err(|_| CodecError::EntropyUnavailable)?;
        Ok(Self(buf))
    }

    /// Parse the conventional textual form of a key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyEncoding`] for bad base64 and
    /// [`CodecError::InvalidKeyLength`] if it does not decode to 32 bytes.
    pub fn from_base64(text: &str) -> Result<Self, CodecError> {
        let raw = Zeroizing::new(
            KEY_TEXT
                .decode(text.trim())
                .map_err(|_| CodecError::InvalidKeyEncoding)?,
        );
        Self::from_slice(&raw)
    }

    /// Render the key in its textual form.
    pub fn to_base64(&self) -> String {
        KEY_TEXT.encode(&self.0[..])
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Split into the signing half and the cipher half.
    pub(crate) fn split(&self) -> (SigningKey, CipherKey) {
        let signing: Zeroizing<[u8; SUB_KEY_LEN]> =
            Zeroizing::new(core::array::from_fn(|i| self.0[i]));
        let cipher: Zeroizing<[u8; SUB_KEY_LEN]> =
            Zeroizing::new(core::array::from_fn(|i| self.0[SUB_KEY_LEN + i]));
        (SigningKey::new(&signing), CipherKey(cipher))
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        // Only used by tests and key-file bookkeeping, never on the token path.
        self.0[..] == other.0[..]
    }
}

impl Eq for SecretKey {}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// HMAC-SHA256 key derived from the first half of a [`SecretKey`].
///
/// Holds a keyed MAC state that is cloned per operation, so the raw bytes are
/// not retained after construction.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    fn new(bytes: &[u8; SUB_KEY_LEN]) -> Self {
        // HMAC zero-pads short keys to the block size, so this is the same key.
        let mut block = Key::<HmacSha256>::default();
        block[..SUB_KEY_LEN].copy_from_slice(bytes);
        let mac = <HmacSha256 as Mac>::new(&block);
        block.as_mut_slice().zeroize();
        Self { mac }
    }

    pub(crate) fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

/// AES-128 key taken from the second half of a [`SecretKey`]. Zeroed on drop.
#[derive(Clone)]
pub struct CipherKey(Zeroizing<[u8; SUB_KEY_LEN]>);

impl CipherKey {
    pub(crate) fn as_bytes(&self) -> &[u8; SUB_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_and_long_keys() {
        assert_eq!(
            SecretKey::from_slice(&[0u8; 16]).unwrap_err(),
            CodecError::InvalidKeyLength { actual: 16 }
        );
        assert_eq!(
            SecretKey::from_slice(&[0u8; 33]).unwrap_err(),
            CodecError::InvalidKeyLength { actual: 33 }
        );
    }

    #[test]
    fn generated_keys_differ() {
        let a = SecretKey::generate().unwrap();
        let b = SecretKey::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn textual_form_accepts_padded_and_unpadded() {
        let padded = "cw_0x689RpI-jtRR7oE8h_eQsKImvJapLeSbXpwF4e4=";
        let key = SecretKey::from_base64(padded).unwrap();
        assert_eq!(key.to_base64(), padded);

        let unpadded = SecretKey::from_base64(padded.trim_end_matches('=')).unwrap();
        assert_eq!(unpadded, key);
    }

    #[test]
    fn textual_form_rejects_garbage() {
        assert_eq!(
            SecretKey::from_base64("not base64 at all!").unwrap_err(),
            CodecError::InvalidKeyEncoding
        );
        // Valid base64, but only 3 bytes.
        assert_eq!(
            SecretKey::from_base64("AAAA").unwrap_err(),
            CodecError::InvalidKeyLength { actual: 3 }
        );
    }

    #[test]
    fn cipher_half_is_second_sixteen_bytes() {
        let mut raw = [0u8; KEY_LEN];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = i as u8;
        }
        let key = SecretKey::from_slice(&raw).unwrap();
        let (_, cipher) = key.split();
        assert_eq!(&cipher.as_bytes()[..], &raw[SUB_KEY_LEN..]);
    }

    #[test]
    fn padded_signing_key_matches_slice_keyed_mac() {
        let raw: [u8; KEY_LEN] = core::array::from_fn(|i| (i * 7) as u8);
        let (signing, _) = SecretKey::from_slice(&raw).unwrap().split();

        let mut expected = HmacSha256::new_from_slice(&raw[..SUB_KEY_LEN]).unwrap();
        expected.update(b"message");
        let mut actual = signing.mac();
        actual.update(b"message");
        assert_eq!(
            actual.finalize().into_bytes(),
            expected.finalize().into_bytes()
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = SecretKey::from_slice(&[0xAB; KEY_LEN]).unwrap();
        let (signing, cipher) = key.split();
        for rendered in [
            format!("{key:?}"),
            format!("{signing:?}"),
            format!("{cipher:?}"),
        ] {
            assert!(rendered.contains("REDACTED"));
            assert!(!rendered.to_lowercase().contains("ab"));
        }
    }
}
