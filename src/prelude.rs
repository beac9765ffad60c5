//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use sops_secrets_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, ObjectStore, ReconcileOutcome, Reconciler, ReconcilerError, Requeue,
    SopsSecretStatusMessage,
};

// Decryption
pub use crate::controller::decryption::{decode, DataKey, DecodeError, KeyServices};

// Secret synthesis
pub use crate::controller::synthesizer::{synthesize, SynthesisError};

// Config types
pub use crate::config::{ControllerArgs, ControllerConfig};
