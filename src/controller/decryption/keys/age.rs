//! # age Key Slots
//!
//! The data key is an armored age file encrypted to an X25519 recipient.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::{DataKey, KeySlot, KeyServices, DATA_KEY_LEN};
use crate::crd::AgeItem;
use age::armor::{ArmoredReader, ArmoredWriter, Format};
use async_trait::async_trait;
use std::io::{Read, Write};
use std::str::FromStr;
use tracing::trace;
use zeroize::Zeroizing;

const PROVIDER: &str = "age";

/// Upper bound on decrypted slot size; a data key is 32 bytes
const MAX_UNWRAPPED_LEN: u64 = 1024;

#[async_trait]
impl KeySlot for AgeItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.recipient
    }

    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError> {
        if services.age_identities.is_empty() {
            return Err(KeySlotError::MissingCredentials {
                provider: PROVIDER,
                message: "no age identities loaded (set SOPS_AGE_KEY or SOPS_AGE_KEY_FILE)".into(),
            });
        }
        trace!(recipient = %self.recipient, "Trying age recipient");
        let plaintext = decrypt_armored(&self.enc, &services.age_identities)?;
        DataKey::from_slice(PROVIDER, &plaintext)
    }
}

fn decrypt_armored(
    armored: &str,
    identities: &[age::x25519::Identity],
) -> Result<Zeroizing<Vec<u8>>, KeySlotError> {
    let decryptor = age::Decryptor::new_buffered(ArmoredReader::new(armored.as_bytes()))
        .map_err(|e| unwrap_error(format!("failed to parse age ciphertext: {e}")))?;
    if decryptor.is_scrypt() {
        return Err(unwrap_error(
            "passphrase-encrypted data keys are not supported".into(),
        ));
    }

    let reader = decryptor
        .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
        .map_err(|e| unwrap_error(format!("no loaded identity matches: {e}")))?;

    let mut plaintext = Zeroizing::new(Vec::with_capacity(DATA_KEY_LEN));
    reader
        .take(MAX_UNWRAPPED_LEN + 1)
        .read_to_end(&mut plaintext)
        .map_err(|e| unwrap_error(format!("failed to read decrypted data key: {e}")))?;
    Ok(plaintext)
}

/// Wrap a data key for an age recipient, producing a key slot
pub fn wrap_data_key(
    recipient: &age::x25519::Recipient,
    key: &DataKey,
) -> Result<AgeItem, KeySlotError> {
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| unwrap_error(format!("failed to build age encryptor: {e}")))?;

    let mut armored = Vec::new();
    let writer = ArmoredWriter::wrap_output(&mut armored, Format::AsciiArmor)
        .map_err(|e| unwrap_error(format!("failed to start armored output: {e}")))?;
    let mut stream = encryptor
        .wrap_output(writer)
        .map_err(|e| unwrap_error(format!("failed to start age stream: {e}")))?;
    stream
        .write_all(key.as_bytes())
        .and_then(|()| stream.finish())
        .and_then(ArmoredWriter::finish)
        .map_err(|e| unwrap_error(format!("failed to write age stream: {e}")))?;

    let enc = String::from_utf8(armored)
        .map_err(|e| unwrap_error(format!("armored output is not UTF-8: {e}")))?;
    Ok(AgeItem {
        recipient: recipient.to_string(),
        enc,
    })
}

/// Parse age identities from key file contents
///
/// One `AGE-SECRET-KEY-1...` per line; blank lines and `#` comments are skipped.
pub fn load_identities(contents: &str) -> Result<Vec<age::x25519::Identity>, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(index, line)| {
            age::x25519::Identity::from_str(line)
                .map_err(|e| format!("invalid age identity #{}: {e}", index + 1))
        })
        .collect()
}

fn unwrap_error(message: String) -> KeySlotError {
    KeySlotError::Unwrap {
        provider: PROVIDER,
        message,
    }
}
