//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::{ERROR_BACKOFF_MAX_MINUTES, ERROR_BACKOFF_MIN_MINUTES};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::decryption::KeyServices;
use crate::controller::reconciler::status::SopsSecretStatusMessage;
use crate::controller::reconciler::store::{ObjectStore, StoreError};
use kube::runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Errors that end a reconcile cycle without a status
///
/// Everything else is absorbed into a status message. These go to the error policy.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to fetch SopsSecret: {0}")]
    Fetch(#[from] StoreError),
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: &'static str },
    #[error("resource has no namespace")]
    MissingNamespace,
}

/// When to look at a resource again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change event
    Never,
    After(Duration),
}

impl From<Requeue> for Action {
    fn from(requeue: Requeue) -> Self {
        match requeue {
            Requeue::Never => Action::await_change(),
            Requeue::After(delay) => Action::requeue(delay),
        }
    }
}

/// Result of one reconcile cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// `None` when the resource no longer exists
    pub status: Option<SopsSecretStatusMessage>,
    pub requeue: Requeue,
}

impl ReconcileOutcome {
    pub(crate) fn gone() -> Self {
        Self {
            status: None,
            requeue: Requeue::Never,
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            backoff: FibonacciBackoff::new(ERROR_BACKOFF_MIN_MINUTES, ERROR_BACKOFF_MAX_MINUTES),
            error_count: 0,
        }
    }
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared reconciler context
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub key_services: Arc<KeyServices>,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name), driven by the error policy
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("key_services", &self.key_services)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        key_services: Arc<KeyServices>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        Self {
            store,
            key_services,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Requeue decision for a status
    pub fn requeue_for(&self, status: SopsSecretStatusMessage) -> Requeue {
        match status {
            SopsSecretStatusMessage::Healthy | SopsSecretStatusMessage::Suspended => Requeue::Never,
            SopsSecretStatusMessage::UnknownError if self.config.requeue_unknown_errors_immediately => {
                Requeue::After(Duration::ZERO)
            }
            _ => Requeue::After(self.config.requeue_decrypt_after()),
        }
    }
}
