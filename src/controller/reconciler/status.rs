//! # Status Messages
//!
//! The fixed set of `status.message` values a SopsSecret can carry.

use std::fmt;

/// Outcome of a reconcile cycle as written to `status.message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SopsSecretStatusMessage {
    Healthy,
    DecryptionError,
    ChildCreationError,
    SettingOwnershipError,
    UnknownError,
    ChildNotOwned,
    ChildUpdateError,
    Suspended,
}

impl SopsSecretStatusMessage {
    /// Every status message
    pub const ALL: [Self; 8] = [
        Self::Healthy,
        Self::DecryptionError,
        Self::ChildCreationError,
        Self::SettingOwnershipError,
        Self::UnknownError,
        Self::ChildNotOwned,
        Self::ChildUpdateError,
        Self::Suspended,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::DecryptionError => "Decryption error",
            Self::ChildCreationError => "New child secret creation error",
            Self::SettingOwnershipError => "Setting controller ownership of the child secret error",
            Self::UnknownError => "Unknown Error",
            Self::ChildNotOwned => "Child secret is not owned by controller error",
            Self::ChildUpdateError => "Child secret update error",
            Self::Suspended => "Reconciliation is suspended",
        }
    }

    /// Parse a stored status message
    pub fn parse(message: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == message)
    }

    /// Failure statuses count towards the failures metric
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Healthy | Self::Suspended)
    }
}

impl fmt::Display for SopsSecretStatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
