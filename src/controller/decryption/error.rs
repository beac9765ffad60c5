//! # Decryption Errors
//!
//! Error types for key recovery and SOPS tree decryption, with a coarse
//! classification used for logging and metrics labels.

use thiserror::Error;

/// Failure of a single key slot
#[derive(Debug, Error)]
pub enum KeySlotError {
    /// No credentials for this provider are available to the controller
    #[error("no {provider} credentials available: {message}")]
    MissingCredentials {
        provider: &'static str,
        message: String,
    },
    /// The provider was reached but could not unwrap the data key
    #[error("{provider} could not unwrap the data key: {message}")]
    Unwrap {
        provider: &'static str,
        message: String,
    },
    /// The provider could not be reached or returned an unexpected response
    #[error("{provider} key service request failed: {message}")]
    Service {
        provider: &'static str,
        message: String,
    },
    /// The slot unwrapped to something that is not a 256-bit key
    #[error("{provider} returned a data key of {length} bytes, expected 32")]
    InvalidKeyLength {
        provider: &'static str,
        length: usize,
    },
}

impl KeySlotError {
    /// Provider the failing slot belongs to
    pub fn provider(&self) -> &'static str {
        match self {
            Self::MissingCredentials { provider, .. }
            | Self::Unwrap { provider, .. }
            | Self::Service { provider, .. }
            | Self::InvalidKeyLength { provider, .. } => provider,
        }
    }
}

/// Every key slot failed
#[derive(Debug, Error)]
#[error("failed to recover the data key from any of {attempted} key slot(s)")]
pub struct KeyRecoveryError {
    /// Number of slots that were tried
    pub attempted: usize,
    /// Error of the last slot tried, `None` when there were no slots
    #[source]
    pub last: Option<KeySlotError>,
}

/// Decoding a SopsSecret failed
///
/// Decoding is all or nothing: when any variant is returned no decrypted value
/// has left the decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The resource has no `sops` block
    #[error("resource has no sops metadata")]
    MissingMetadata,

    /// `encrypted_suffix` and `encrypted_regex` are both set, or the regex is invalid
    #[error("invalid sops metadata: {0}")]
    InvalidMetadata(String),

    #[error(transparent)]
    KeyRecovery(#[from] KeyRecoveryError),

    /// A value or the message authentication code did not authenticate
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// An encrypted value could not be parsed
    #[error("malformed encrypted value at '{path}': {reason}")]
    MalformedValue { path: String, reason: String },

    /// The resource could not be encoded or decoded
    #[error("failed to (de)serialize resource: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailureReason {
    KeyRecovery,
    Authentication,
    Format,
}

impl DecodeFailureReason {
    /// Get string representation for metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyRecovery => "key_recovery",
            Self::Authentication => "authentication",
            Self::Format => "format",
        }
    }

    /// Check if this failure may resolve without editing the resource
    ///
    /// Key services can be down or credentials can be rotated in; a bad MAC or a
    /// malformed document needs a new encryption.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::KeyRecovery)
    }

    /// Get a remediation hint for operators
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::KeyRecovery => "Verify the controller has credentials for at least one key group in the sops block (age key, KMS permissions, Vault token)",
            Self::Authentication => "Re-encrypt the SopsSecret; its values or MAC were modified after encryption or encrypted with another data key",
            Self::Format => "Re-encrypt the SopsSecret with sops; the document or its sops block is not valid",
        }
    }
}

impl DecodeError {
    pub fn reason(&self) -> DecodeFailureReason {
        match self {
            Self::KeyRecovery(_) => DecodeFailureReason::KeyRecovery,
            Self::AuthenticationFailed(_) => DecodeFailureReason::Authentication,
            Self::MissingMetadata
            | Self::InvalidMetadata(_)
            | Self::MalformedValue { .. }
            | Self::Serialization(_) => DecodeFailureReason::Format,
        }
    }
}
