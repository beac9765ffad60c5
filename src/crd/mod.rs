//! # Custom Resource Definitions
//!
//! CRD types for the SopsSecret controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `SopsSecret` resource, its spec and secret templates
//! - `sops.rs` - SOPS encryption metadata and per-provider key slots
//! - `status.rs` - Status types for tracking reconciliation state

mod sops;
mod spec;
mod status;

// Re-export all public types
pub use sops::{
    AgeItem, AzureKmsItem, GcpKmsDataItem, HcVaultItem, KmsDataItem, PgpDataItem, SopsMetadata,
};
pub use spec::{
    default_false, SecretTemplate, SopsSecret, SopsSecretSpec, GROUP, KIND, PLURAL, VERSION,
};
pub use status::SopsSecretStatus;
