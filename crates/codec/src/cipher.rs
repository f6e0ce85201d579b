//! AES-128-CBC with PKCS#7 padding.
//!
//! This layer knows nothing about tokens or authentication. Callers must only
//! hand it ciphertext whose integrity tag has already been checked.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

use crate::key::CipherKey;

/// AES block size in bytes; also the IV length.
pub const BLOCK_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Errors produced by the block cipher layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Ciphertext is not a whole number of blocks, or its padding is invalid.
    /// The two cases are deliberately indistinguishable.
    #[error("block decode failure")]
    DecodeFailure,
}

/// Pad `plaintext` to a block multiple and encrypt it in CBC mode seeded by `iv`.
pub fn encrypt_blocks(key: &CipherKey, iv: &[u8; BLOCK_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.as_bytes().into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` and strip its padding.
///
/// # Errors
///
/// Returns [`BlockError::DecodeFailure`] if `ciphertext` is empty, not a block
/// multiple, or unpads to an invalid structure.
pub fn decrypt_blocks(
    key: &CipherKey,
    iv: &[u8; BLOCK_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, BlockError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(BlockError::DecodeFailure);
    }
    Aes128CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| BlockError::DecodeFailure)
}
