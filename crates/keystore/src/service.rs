//! [`CodecService`]: the shared, reloadable codec handed to the rest of the process.
//!
//! The codec itself is immutable. Changing keys means asking the provider for
//! a key again and atomically swapping in a newly built [`MultiCodec`]; readers
//! on the encrypt/decrypt path never block. A key the provider stops handing
//! out is retired, not dropped: tokens sealed under it still decrypt.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use codec::{Codec, CodecError, MultiCodec, SecretKey};
use tokio::time;
use tracing::{info, warn};

use crate::error::KeyStoreError;
use crate::provider::KeyProvider;

static GLOBAL: OnceLock<CodecService> = OnceLock::new();

/// Cheap-to-clone handle to the current codec and the provider it came from.
#[derive(Clone)]
pub struct CodecService {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Box<dyn KeyProvider>,
    legacy: Vec<Codec>,
    ring: ArcSwap<KeyRing>,
}

/// The provider's current key, the keys it handed out before (newest first),
/// and the codec built from them.
struct KeyRing {
    primary: SecretKey,
    retired: Vec<SecretKey>,
    codec: Arc<MultiCodec>,
}

impl KeyRing {
    fn new(primary: SecretKey, retired: Vec<SecretKey>, legacy: &[Codec]) -> Self {
        let fallbacks = retired
            .iter()
            .map(Codec::from_key)
            .chain(legacy.iter().cloned())
            .collect();
        let codec = Arc::new(MultiCodec::new(Codec::from_key(&primary), fallbacks));
        Self {
            primary,
            retired,
            codec,
        }
    }

    /// Promote `key`, retiring the outgoing primary.
    fn advance(&self, key: &SecretKey, legacy: &[Codec]) -> Self {
        let mut retired = Vec::with_capacity(self.retired.len() + 1);
        retired.push(self.primary.clone());
        retired.extend(self.retired.iter().filter(|k| *k != key).cloned());
        Self::new(key.clone(), retired, legacy)
    }
}

impl CodecService {
    /// Load the key from `provider` and build the first codec.
    ///
    /// `legacy_keys` are accepted on decrypt, after the provider's keys, in order.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider reports.
    pub fn new<P>(provider: P, legacy_keys: Vec<SecretKey>) -> Result<Self, KeyStoreError>
    where
        P: KeyProvider + 'static,
    {
        let legacy: Vec<Codec> = legacy_keys.iter().map(Codec::from_key).collect();
        let provider: Box<dyn KeyProvider> = Box::new(provider);
        let ring = KeyRing::new(provider.load_key()?, Vec::new(), &legacy);
        info!(keys = ring.codec.key_count(), "codec service ready");
        Ok(Self {
            inner: Arc::new(Inner {
                provider,
                legacy,
                ring: ArcSwap::from_pointee(ring),
            }),
        })
    }

    /// Snapshot of the codec in effect right now.
    pub fn current(&self) -> Arc<MultiCodec> {
        Arc::clone(&self.inner.ring.load().codec)
    }

    /// Encrypt under the current primary key.
    ///
    /// # Errors
    ///
    /// See [`Codec::encrypt`].
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        self.inner.ring.load().codec.encrypt(plaintext)
    }

    /// Decrypt under the current key set.
    ///
    /// # Errors
    ///
    /// See [`MultiCodec::decrypt`].
    pub fn decrypt(&self, token: &str, ttl_seconds: i64) -> Result<Vec<u8>, CodecError> {
        self.inner.ring.load().codec.decrypt(token, ttl_seconds)
    }

    /// Ask the provider for the key again.
    ///
    /// A different key becomes the primary and the outgoing one stays
    /// available for decryption. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns the provider error that prevented the reload.
    pub fn reload(&self) -> Result<(), KeyStoreError> {
        let key = self.inner.provider.load_key()?;
        let previous = self.inner.ring.rcu(|ring| {
            if ring.primary == key {
                Arc::clone(ring)
            } else {
                Arc::new(ring.advance(&key, &self.inner.legacy))
            }
        });
        if previous.primary != key {
            info!(
                retired = previous.retired.len() + 1,
                "key changed on reload; previous keys kept for decryption"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for CodecService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecService")
            .field("keys", &self.inner.ring.load().codec.key_count())
            .finish_non_exhaustive()
    }
}

/// Make `service` the process-wide instance.
///
/// # Errors
///
/// Returns [`KeyStoreError::AlreadyInstalled`] if called more than once.
pub fn install_global(service: CodecService) -> Result<&'static CodecService, KeyStoreError> {
    GLOBAL
        .set(service)
        .map_err(|_| KeyStoreError::AlreadyInstalled)?;
    global()
}

/// The process-wide instance.
///
/// # Errors
///
/// Returns [`KeyStoreError::NotInitialised`] before [`install_global`] succeeds.
pub fn global() -> Result<&'static CodecService, KeyStoreError> {
    GLOBAL.get().ok_or(KeyStoreError::NotInitialised)
}

/// Spawn a background task that reloads `service` every `interval`.
///
/// The first reload fires after one full interval. A failed reload is logged
/// and the previous codec is retained.
pub fn reload_task(service: CodecService, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // First tick fires immediately; the service was loaded at construction.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let svc = service.clone();
            match tokio::task::spawn_blocking(move || svc.reload()).await {
                Ok(Ok(())) => info!("codec key reloaded"),
                Ok(Err(e)) => warn!(error = %e, "key reload failed; retaining previous key"),
                Err(e) => warn!(error = %e, "key reload task panicked; retaining previous key"),
            }
        }
    })
}
