//! # Runtime
//!
//! Process-level wiring for the controller binary.
//!
//! - `initialization`: Tracing, metrics, probe server, client and reconciler setup
//! - `watch_loop`: The controller watch loop with automatic restart
//! - `error_policy`: Backoff for failed reconciles and watch stream errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
