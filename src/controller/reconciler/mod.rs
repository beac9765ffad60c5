//! # Reconciler
//!
//! Core reconciliation logic for `SopsSecret` resources.
//!
//! The reconciler:
//! - Decrypts each SopsSecret with the key slots in its `sops` block
//! - Creates or updates one Kubernetes Secret per secret template
//! - Refuses to touch Secrets it does not own unless they are annotated for adoption
//! - Writes the outcome to `status.message`

pub mod reconcile;
pub mod status;
pub mod store;
pub mod types;

// Re-export public API
pub use reconcile::reconcile;
pub use status::SopsSecretStatusMessage;
pub use store::{KubeStore, ObjectStore, StoreError};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError, Requeue};
