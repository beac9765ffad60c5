//! # PGP Key Slots
//!
//! The wrapped data key is an armored OpenPGP message. It is piped through the `gpg`
//! binary; the secret key must already be in the keyring (`GNUPGHOME`).
//!
//! Nothing is written to disk: the message goes to gpg's stdin and the key comes
//! back on stdout.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::{DataKey, KeySlot, KeyServices};
use crate::crd::PgpDataItem;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use zeroize::Zeroizing;

const PROVIDER: &str = "pgp";

#[async_trait]
impl KeySlot for PgpDataItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.fp
    }

    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError> {
        let gpg_path = which::which("gpg").map_err(|e| KeySlotError::MissingCredentials {
            provider: PROVIDER,
            message: format!("gpg binary not found in PATH: {e}"),
        })?;
        debug!("Using gpg binary at: {:?}", gpg_path);

        let mut cmd = tokio::process::Command::new(gpg_path);
        cmd.args(["--batch", "--quiet", "--no-tty", "--decrypt"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(home) = &services.gnupg_home {
            cmd.env("GNUPGHOME", home);
        }

        let mut child = cmd.spawn().map_err(|e| service_error(format!("failed to spawn gpg: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.enc.as_bytes())
                .await
                .map_err(|e| service_error(format!("failed to write to gpg stdin: {e}")))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| service_error(format!("failed to close gpg stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| service_error(format!("failed to wait for gpg: {e}")))?;
        let plaintext = Zeroizing::new(output.stdout);

        if !output.status.success() {
            return Err(KeySlotError::Unwrap {
                provider: PROVIDER,
                message: format!(
                    "gpg exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        DataKey::from_slice(PROVIDER, &plaintext)
    }
}

fn service_error(message: String) -> KeySlotError {
    KeySlotError::Service {
        provider: PROVIDER,
        message,
    }
}
