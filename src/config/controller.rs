//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_METRICS_PORT, DEFAULT_REQUEUE_DECRYPT_AFTER_MINUTES,
    DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
    DEFAULT_STORE_TIMEOUT_SECS, DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS, MIN_REQUEUE_DECRYPT_AFTER_MINUTES,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables,
/// and then again by command-line flags (see [`crate::config::ControllerArgs`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requeue interval after a failed reconciliation (minutes, never below 1)
    pub requeue_decrypt_after_minutes: u64,
    /// Restrict the watch to a single namespace; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Requeue "Unknown Error" outcomes immediately instead of after the requeue interval
    pub requeue_unknown_errors_immediately: bool,
    /// Deadline applied to every Kubernetes API call made during a reconcile (seconds)
    pub store_timeout_secs: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciles: u16,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_decrypt_after_minutes: DEFAULT_REQUEUE_DECRYPT_AFTER_MINUTES,
            watch_namespace: None,
            requeue_unknown_errors_immediately: false,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let watch_namespace = env_var_or_default_str("WATCH_NAMESPACE", "");
        Self {
            requeue_decrypt_after_minutes: clamp_requeue_minutes(env_var_or_default(
                "REQUEUE_DECRYPT_AFTER",
                DEFAULT_REQUEUE_DECRYPT_AFTER_MINUTES,
            )),
            watch_namespace: (!watch_namespace.is_empty()).then_some(watch_namespace),
            requeue_unknown_errors_immediately: env_var_or_default_bool(
                "REQUEUE_UNKNOWN_ERRORS_IMMEDIATELY",
                false,
            ),
            store_timeout_secs: env_var_or_default("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS),
            max_concurrent_reconciles: env_var_or_default(
                "MAX_CONCURRENT_RECONCILES",
                DEFAULT_MAX_CONCURRENT_RECONCILES,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
        }
    }

    /// Set the requeue interval, clamping it to the one minute floor
    #[must_use]
    pub fn with_requeue_decrypt_after(mut self, minutes: u64) -> Self {
        self.requeue_decrypt_after_minutes = clamp_requeue_minutes(minutes);
        self
    }

    /// Get requeue interval as a duration
    pub fn requeue_decrypt_after(&self) -> Duration {
        Duration::from_secs(clamp_requeue_minutes(self.requeue_decrypt_after_minutes) * 60)
    }

    /// Get Kubernetes API call deadline
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

fn clamp_requeue_minutes(minutes: u64) -> u64 {
    minutes.max(MIN_REQUEUE_DECRYPT_AFTER_MINUTES)
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
