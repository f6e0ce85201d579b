//! `codec-tool`: command-line front end for the token codec.
//!
//! Startup sequence:
//! 1. Parse the command line. `keygen` needs nothing else and exits here.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise structured JSON logging on stderr.
//! 4. Build the [`CodecService`] from the key file and install it process-wide.
//! 5. Read stdin, run the command, write stdout.

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codec::SecretKey;
use keystore::{CodecService, FileKeyProvider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "codec-tool", version, about = "Encrypt and decrypt authenticated tokens")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print a freshly generated key in textual form.
    Keygen,
    /// Read bytes from stdin and print a token.
    Encrypt,
    /// Read a token from stdin and write the plaintext bytes.
    Decrypt {
        /// Maximum token age in seconds; `0` or less disables expiry.
        #[arg(long, allow_hyphen_values = true)]
        ttl: Option<i64>,
    },
    /// Read a token from stdin and print it re-encrypted under the current key.
    Rotate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();
    if matches!(cli.command, Command::Keygen) {
        return write_stdout(&keygen()?).await;
    }

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: codec-tool configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "codec-tool starting");

    // -----------------------------------------------------------------------
    // 4. Codec service
    // -----------------------------------------------------------------------
    let service = keystore::install_global(build_service(&cfg)?)
        .context("failed to install codec service")?;

    // -----------------------------------------------------------------------
    // 5. Run
    // -----------------------------------------------------------------------
    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .context("failed to read stdin")?;

    let output = execute(service, &cli.command, &input, cfg.ttl_seconds)?;
    write_stdout(&output).await
}

fn build_service(cfg: &Config) -> Result<CodecService> {
    let mut provider = FileKeyProvider::new(&cfg.key_file);
    if let Some(legacy) = &cfg.legacy_key_file {
        provider = provider.with_legacy_path(legacy);
    }

    let legacy_keys = cfg
        .fallback_key
        .as_deref()
        .map(SecretKey::from_base64)
        .transpose()
        .context("CODEC_FALLBACK_KEY is not a valid key")?
        .into_iter()
        .collect();

    CodecService::new(provider, legacy_keys)
        .with_context(|| format!("failed to load key from {}", cfg.key_file))
}

/// Run one command over `input`, returning what should be written to stdout.
fn execute(
    service: &CodecService,
    command: &Command,
    input: &[u8],
    default_ttl: i64,
) -> Result<Vec<u8>> {
    match command {
        Command::Keygen => keygen(),
        Command::Encrypt => {
            let token = service.encrypt(input).context("encryption failed")?;
            debug!(plaintext_len = input.len(), "token issued");
            Ok(line(token))
        }
        Command::Decrypt { ttl } => {
            let ttl = ttl.unwrap_or(default_ttl);
            let token = token_text(input)?;
            let plaintext = service
                .decrypt(token, ttl)
                .context("token rejected")?;
            debug!(ttl_seconds = ttl, "token accepted");
            Ok(plaintext)
        }
        Command::Rotate => {
            let token = token_text(input)?;
            let rotated = service
                .current()
                .rotate(token)
                .context("token rejected")?;
            Ok(line(rotated))
        }
    }
}

fn keygen() -> Result<Vec<u8>> {
    let key = SecretKey::generate().context("failed to generate key")?;
    Ok(line(key.to_base64()))
}

fn token_text(input: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(input).context("token is not valid UTF-8")?;
    Ok(text.trim())
}

fn line(mut text: String) -> Vec<u8> {
    text.push('\n');
    text.into_bytes()
}

async fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(bytes)
        .await
        .context("failed to write stdout")?;
    stdout.flush().await.context("failed to flush stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::{Codec, CodecError};
    use keystore::StaticKeyProvider;

    fn service_with(key: &SecretKey) -> CodecService {
        CodecService::new(StaticKeyProvider::new(key.clone()), vec![]).unwrap()
    }

    fn output_text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn cli_parses_decrypt_ttl() {
        let cli = Cli::try_parse_from(["codec-tool", "decrypt", "--ttl", "3600"]).unwrap();
        assert!(matches!(cli.command, Command::Decrypt { ttl: Some(3600) }));

        let cli = Cli::try_parse_from(["codec-tool", "decrypt", "--ttl", "-1"]).unwrap();
        assert!(matches!(cli.command, Command::Decrypt { ttl: Some(-1) }));
    }

    #[test]
    fn cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["codec-tool", "sign"]).is_err());
    }

    #[test]
    fn encrypt_then_decrypt_with_trailing_newline() {
        let svc = service_with(&SecretKey::generate().unwrap());
        let token = execute(&svc, &Command::Encrypt, b"hello", 0).unwrap();
        assert!(token.ends_with(b"\n"));

        let plaintext = execute(&svc, &Command::Decrypt { ttl: None }, &token, 0).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn decrypt_uses_default_ttl_unless_overridden() {
        let key = SecretKey::generate().unwrap();
        let svc = service_with(&key);
        let stale = Codec::from_key(&key).encrypt_at(b"x", 1).unwrap();

        let err = execute(&svc, &Command::Decrypt { ttl: None }, stale.as_bytes(), 60)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<CodecError>(),
            Some(&CodecError::TokenExpired)
        );

        let ok = execute(&svc, &Command::Decrypt { ttl: Some(0) }, stale.as_bytes(), 60)
            .unwrap();
        assert_eq!(ok, b"x");
    }

    #[test]
    fn decrypt_reports_wrong_key() {
        let svc = service_with(&SecretKey::generate().unwrap());
        let foreign = Codec::from_key(&SecretKey::generate().unwrap())
            .encrypt(b"x")
            .unwrap();
        let err = execute(&svc, &Command::Decrypt { ttl: None }, foreign.as_bytes(), 0)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<CodecError>(),
            Some(&CodecError::InvalidSignature)
        );
    }

    #[test]
    fn decrypt_rejects_non_utf8_input() {
        let svc = service_with(&SecretKey::generate().unwrap());
        assert!(execute(&svc, &Command::Decrypt { ttl: None }, &[0xFF, 0xFE], 0).is_err());
    }

    #[test]
    fn rotate_reissues_legacy_token_under_current_key() {
        let current = SecretKey::generate().unwrap();
        let legacy = SecretKey::generate().unwrap();
        let svc =
            CodecService::new(StaticKeyProvider::new(current.clone()), vec![legacy.clone()])
                .unwrap();

        let old = Codec::from_key(&legacy).encrypt_at(b"r", 77).unwrap();
        let rotated = output_text(execute(&svc, &Command::Rotate, old.as_bytes(), 0).unwrap());

        let codec = Codec::from_key(&current);
        assert_eq!(codec.extract_timestamp(rotated.trim()).unwrap(), 77);
        assert_eq!(codec.decrypt(rotated.trim(), 0).unwrap(), b"r");
    }

    #[test]
    fn keygen_prints_a_usable_key() {
        let text = output_text(keygen().unwrap());
        assert!(text.ends_with('\n'));
        assert!(SecretKey::from_base64(text.trim()).is_ok());
    }

    #[test]
    fn keygen_through_execute_ignores_service_key() {
        let key = SecretKey::generate().unwrap();
        let svc = service_with(&key);
        let text = output_text(execute(&svc, &Command::Keygen, &[], 0).unwrap());
        assert_ne!(SecretKey::from_base64(text.trim()).unwrap(), key);
    }

    #[test]
    fn build_service_rejects_bad_fallback_key() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            key_file: dir.path().join("token.key").display().to_string(),
            legacy_key_file: None,
            fallback_key: Some("definitely not a key".into()),
            ttl_seconds: 0,
            log_level: "info".into(),
        };
        assert!(build_service(&cfg).is_err());
    }

    #[test]
    fn build_service_creates_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.key");
        let cfg = Config {
            key_file: path.display().to_string(),
            legacy_key_file: None,
            fallback_key: Some(SecretKey::generate().unwrap().to_base64()),
            ttl_seconds: 0,
            log_level: "info".into(),
        };
        let svc = build_service(&cfg).unwrap();
        assert!(path.exists());
        assert_eq!(svc.current().key_count(), 2);
    }
}
