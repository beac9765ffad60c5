//! # Key Recovery
//!
//! Recovers the SOPS data key from the key slots in a `sops` block.
//!
//! Every provider's slot type implements [`KeySlot`]. Slots are tried one after
//! another and the first one that unwraps a 256-bit key wins; a resource only needs
//! one working slot. Key material is never combined across slots.
//!
//! Slots are tried in SOPS key group order: AWS KMS, GCP KMS, Azure Key Vault,
//! HashiCorp Vault, age, PGP.

mod age;
mod aws;
mod azure;
mod gcp;
mod pgp;
mod services;
mod vault;

pub use age::{load_identities, wrap_data_key};
pub use services::{AzureCredentials, KeyServices};

use crate::controller::decryption::error::{KeyRecoveryError, KeySlotError};
use crate::crd::SopsMetadata;
use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a SOPS data key
pub const DATA_KEY_LEN: usize = 32;

/// The symmetric key that encrypts every value of a SOPS document
///
/// Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; DATA_KEY_LEN]);

impl DataKey {
    /// Generate a fresh random data key
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; DATA_KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Build a data key from unwrapped bytes, rejecting anything that is not 32 bytes
    pub fn from_slice(provider: &'static str, bytes: &[u8]) -> Result<Self, KeySlotError> {
        if bytes.len() != DATA_KEY_LEN {
            return Err(KeySlotError::InvalidKeyLength {
                provider,
                length: bytes.len(),
            });
        }
        let mut key = [0u8; DATA_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; DATA_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(<redacted>)")
    }
}

/// One wrapped copy of the data key
#[async_trait]
pub trait KeySlot: Send + Sync + fmt::Debug {
    /// Provider name used in logs and errors
    fn provider(&self) -> &'static str;

    /// Identifier of the wrapping key (ARN, fingerprint, recipient, ...)
    fn key_id(&self) -> &str;

    /// Unwrap this slot's copy of the data key
    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError>;
}

/// All key slots of a `sops` block, in the order they are tried
pub fn key_slots(metadata: &SopsMetadata) -> Vec<&dyn KeySlot> {
    let mut slots: Vec<&dyn KeySlot> = Vec::with_capacity(metadata.key_slot_count());
    slots.extend(metadata.kms.iter().map(|s| s as &dyn KeySlot));
    slots.extend(metadata.gcp_kms.iter().map(|s| s as &dyn KeySlot));
    slots.extend(metadata.azure_kv.iter().map(|s| s as &dyn KeySlot));
    slots.extend(metadata.hc_vault.iter().map(|s| s as &dyn KeySlot));
    slots.extend(metadata.age.iter().map(|s| s as &dyn KeySlot));
    slots.extend(metadata.pgp.iter().map(|s| s as &dyn KeySlot));
    slots
}

/// Recover the data key from the first slot that can unwrap it
///
/// Fails with [`KeyRecoveryError`] carrying the last slot's error when every slot fails.
pub async fn recover_data_key(
    metadata: &SopsMetadata,
    services: &KeyServices,
) -> Result<DataKey, KeyRecoveryError> {
    recover_from_slots(&key_slots(metadata), services).await
}

/// Try `slots` in order, returning the first recovered key
pub async fn recover_from_slots(
    slots: &[&dyn KeySlot],
    services: &KeyServices,
) -> Result<DataKey, KeyRecoveryError> {
    let mut last = None;
    for slot in slots {
        match slot.unwrap_data_key(services).await {
            Ok(key) => {
                debug!(
                    provider = slot.provider(),
                    key_id = slot.key_id(),
                    "Recovered data key"
                );
                return Ok(key);
            }
            Err(e) => {
                debug!(
                    provider = slot.provider(),
                    key_id = slot.key_id(),
                    error = %e,
                    "Key slot failed, trying next"
                );
                last = Some(e);
            }
        }
    }

    if let Some(e) = &last {
        warn!(
            attempted = slots.len(),
            "No key slot could recover the data key, last error: {}", e
        );
    }
    Err(KeyRecoveryError {
        attempted: slots.len(),
        last,
    })
}
