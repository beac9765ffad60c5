//! # SOPS Decryption
//!
//! Envelope decryption of SopsSecret resources:
//!
//! - [`keys`]: recovers the data key from any one of the key slots
//! - [`tree`]: decrypts the selected leaves and verifies the MAC
//! - [`decode`]: the resource-level entry point used by the reconciler

mod decoder;
pub mod error;
pub mod keys;
pub mod tree;

pub use decoder::decode;
pub use error::{DecodeError, DecodeFailureReason, KeyRecoveryError, KeySlotError};
pub use keys::{recover_data_key, DataKey, KeyServices, KeySlot};
pub use tree::{decrypt_document, encrypt_document, is_encrypted, EncryptedValue, SelectionPolicy};
