//! Key provisioning and the process-wide codec service.
//!
//! The [`codec`] crate is pure: it takes a key and nothing else. This crate
//! owns where that key comes from and hands every caller the same
//! [`CodecService`].
//!
//! # Lifecycle
//!
//! 1. A [`KeyProvider`] yields the 32-byte secret (from a file, or a fixed value).
//! 2. [`CodecService::new`] builds the codec once from that key plus any legacy keys.
//! 3. [`install_global`] publishes it; callers reach it through [`global`].
//! 4. Optionally, [`reload_task`] re-reads the provider on an interval and swaps
//!    in a rebuilt codec. A replaced key stays accepted on decrypt.
//!
//! # Security invariants
//!
//! - Key bytes are never logged or included in errors.
//! - An existing key file is never overwritten.
//! - A key file is never left half-written.
//! - Keys seen by a running service are kept until it drops.

pub mod error;
pub mod provider;
pub mod service;

pub use error::KeyStoreError;
pub use provider::{FileKeyProvider, KeyProvider, StaticKeyProvider};
pub use service::{global, install_global, reload_task, CodecService};
