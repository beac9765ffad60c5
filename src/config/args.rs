//! # Command-Line Arguments
//!
//! Flags accepted by the controller binary. Every flag is optional; an absent flag
//! keeps the value loaded from the environment.

use crate::config::ControllerConfig;
use clap::Parser;

/// SopsSecret controller
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "sops-secrets-controller")]
#[command(about = "Decrypts SopsSecret resources into Kubernetes Secrets", long_about = None)]
pub struct ControllerArgs {
    /// Requeue failed reconciliations after this many minutes (minimum 1)
    #[arg(long = "requeue-decrypt-after", value_name = "MINUTES")]
    pub requeue_decrypt_after: Option<u64>,

    /// Only watch SopsSecrets in this namespace
    #[arg(long = "watch-namespace", value_name = "NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Port serving /metrics, /healthz and /readyz
    #[arg(long = "metrics-port", value_name = "PORT")]
    pub metrics_port: Option<u16>,

    /// Maximum number of SopsSecrets reconciled at the same time
    #[arg(long = "max-concurrent-reconciles", value_name = "N")]
    pub max_concurrent_reconciles: Option<u16>,

    /// Deadline for each Kubernetes API call made while reconciling
    #[arg(long = "store-timeout-secs", value_name = "SECONDS")]
    pub store_timeout_secs: Option<u64>,

    /// Requeue "Unknown Error" outcomes without waiting for the requeue interval
    #[arg(long = "requeue-unknown-errors-immediately")]
    pub requeue_unknown_errors_immediately: bool,
}

impl ControllerArgs {
    /// Overlay the flags that were given on top of `config`
    #[must_use]
    pub fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(minutes) = self.requeue_decrypt_after {
            config = config.with_requeue_decrypt_after(minutes);
        }
        if let Some(namespace) = self.watch_namespace.filter(|ns| !ns.is_empty()) {
            config.watch_namespace = Some(namespace);
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(limit) = self.max_concurrent_reconciles {
            config.max_concurrent_reconciles = limit;
        }
        if let Some(secs) = self.store_timeout_secs {
            config.store_timeout_secs = secs;
        }
        if self.requeue_unknown_errors_immediately {
            config.requeue_unknown_errors_immediately = true;
        }
        config
    }
}
