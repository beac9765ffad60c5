//! SopsSecret Controller Library
//!
//! Decrypts SOPS-encrypted `SopsSecret` resources and keeps the Kubernetes Secrets
//! they describe in sync.
//!
//! ## Quick Start
//!
//! ```rust
//! use sops_secrets_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
