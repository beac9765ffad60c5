//! # SOPS Metadata
//!
//! The `sops` block embedded in every SopsSecret. Field names follow the SOPS file
//! format (snake_case), not the Kubernetes camelCase convention.
//!
//! Every key group entry carries its own wrapped copy of the data key in `enc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SOPS encryption metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SopsMetadata {
    /// AWS KMS key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kms: Vec<KmsDataItem>,
    /// PGP key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pgp: Vec<PgpDataItem>,
    /// Azure Key Vault key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azure_kv: Vec<AzureKmsItem>,
    /// GCP KMS key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gcp_kms: Vec<GcpKmsDataItem>,
    /// HashiCorp Vault transit key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hc_vault: Vec<HcVaultItem>,
    /// age key slots
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub age: Vec<AgeItem>,
    /// Timestamp of the last encryption, also the additional data of `mac`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmodified: Option<String>,
    /// Encrypted message authentication code over the encrypted values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Only values under a key ending with this suffix are encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_suffix: Option<String>,
    /// Only values under a key matching this regular expression are encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_regex: Option<String>,
    /// Version of SOPS that wrote the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SopsMetadata {
    /// Total number of key slots across all providers
    pub fn key_slot_count(&self) -> usize {
        self.kms.len()
            + self.pgp.len()
            + self.azure_kv.len()
            + self.gcp_kms.len()
            + self.hc_vault.len()
            + self.age.len()
    }
}

/// AWS KMS key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct KmsDataItem {
    pub arn: String,
    /// Role to assume before calling KMS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// KMS encryption context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Base64 KMS ciphertext blob
    pub enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_profile: Option<String>,
}

/// PGP key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PgpDataItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// ASCII armored OpenPGP message
    pub enc: String,
    /// Key fingerprint
    pub fp: String,
}

/// Azure Key Vault key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AzureKmsItem {
    pub vault_url: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Base64url (unpadded) wrapped key
    pub enc: String,
}

/// GCP KMS key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GcpKmsDataItem {
    /// `projects/<p>/locations/<l>/keyRings/<r>/cryptoKeys/<k>`
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Base64 ciphertext
    pub enc: String,
}

/// HashiCorp Vault transit key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HcVaultItem {
    pub vault_address: String,
    pub engine_path: String,
    pub key_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Transit ciphertext (`vault:v1:...`)
    pub enc: String,
}

/// age key slot
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgeItem {
    /// Bech32 encoded X25519 recipient (`age1...`)
    pub recipient: String,
    /// ASCII armored age file
    pub enc: String,
}
