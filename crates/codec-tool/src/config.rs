//! Configuration loading and validation for `codec-tool`.
//!
//! All values come from `CODEC_`-prefixed environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path of the raw 32-byte key file; created on first use. **Required.**
    pub key_file: String,

    /// Older key file to migrate from when `key_file` does not exist yet.
    #[serde(default)]
    pub legacy_key_file: Option<String>,

    /// Textual form of a retired key still accepted for decryption.
    #[serde(default)]
    pub fallback_key: Option<String>,

    /// Default maximum token age for `decrypt`; `0` disables expiry.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_ttl_seconds() -> i64 {
    0
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `CODEC_KEY_FILE` is absent or any value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("CODEC"))
            .build()
            .context("failed to build codec-tool configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise codec-tool configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.key_file.trim().is_empty() {
            anyhow::bail!("CODEC_KEY_FILE is required and must not be empty");
        }
        if let Some(legacy) = &self.legacy_key_file {
            if legacy.trim() == self.key_file.trim() {
                anyhow::bail!("CODEC_LEGACY_KEY_FILE must differ from CODEC_KEY_FILE");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            key_file: "/var/lib/codec/token.key".into(),
            legacy_key_file: None,
            fallback_key: None,
            ttl_seconds: default_ttl_seconds(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(default_ttl_seconds(), 0);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_key_file() {
        let cfg = Config {
            key_file: "  ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_legacy_equal_to_key_file() {
        let cfg = Config {
            legacy_key_file: Some("/var/lib/codec/token.key".into()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_ttl_is_allowed() {
        let cfg = Config {
            ttl_seconds: -5,
            ..valid()
        };
        assert!(cfg.validate().is_ok());
    }
}
