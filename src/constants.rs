//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval after a failed reconciliation (minutes)
pub const DEFAULT_REQUEUE_DECRYPT_AFTER_MINUTES: u64 = 5;

/// Lower bound for the requeue interval (minutes)
pub const MIN_REQUEUE_DECRYPT_AFTER_MINUTES: u64 = 1;

/// Default deadline for a single call against the Kubernetes API (seconds)
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of SopsSecrets reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 4;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Fibonacci backoff bounds for errors propagated to the error policy (minutes)
pub const ERROR_BACKOFF_MIN_MINUTES: u64 = 1;
pub const ERROR_BACKOFF_MAX_MINUTES: u64 = 10;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "sops-secrets-controller";

/// Annotation that lets the controller adopt a pre-existing, unowned Secret
///
/// The value must be exactly `"true"`.
pub const ADOPTION_ANNOTATION: &str = "sopssecret/managed";

/// Secret type used when a template does not declare one
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Initial backoff before restarting a watch stream throttled with 429 (milliseconds)
pub const WATCH_BACKOFF_START_MS: u64 = 1_000;

/// Upper bound for the 429 watch restart backoff (milliseconds)
pub const WATCH_BACKOFF_MAX_MS: u64 = 30_000;
