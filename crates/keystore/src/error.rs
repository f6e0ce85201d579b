//! Errors from key provisioning and the shared codec service.

use std::path::PathBuf;

use codec::{CodecError, KEY_LEN};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Reading or writing a key file failed.
    #[error("key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key file exists but does not hold exactly [`KEY_LEN`] bytes.
    #[error("key file {path} has invalid length: expected {KEY_LEN} bytes, got {actual}")]
    InvalidKeyLength { path: PathBuf, actual: usize },

    /// Key material was rejected by the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// [`global`](crate::global) was called before [`install_global`](crate::install_global).
    #[error("codec service not yet initialised")]
    NotInitialised,

    /// [`install_global`](crate::install_global) was called twice.
    #[error("codec service already installed")]
    AlreadyInstalled,
}

impl KeyStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_length_names_the_file() {
        let e = KeyStoreError::InvalidKeyLength {
            path: PathBuf::from("/var/lib/app/token.key"),
            actual: 12,
        };
        let msg = e.to_string();
        assert!(msg.contains("/var/lib/app/token.key"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn codec_errors_pass_through() {
        let e: KeyStoreError = CodecError::EntropyUnavailable.into();
        assert_eq!(e.to_string(), "random source unavailable");
    }
}
