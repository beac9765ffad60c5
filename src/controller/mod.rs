//! # Controller
//!
//! Core controller modules for the SopsSecret controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `decryption`: SOPS key recovery and tree decryption
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `synthesizer`: Builds Kubernetes Secrets from secret templates

pub mod backoff;
pub mod decryption;
pub mod reconciler;
pub mod server;
pub mod synthesizer;
