//! # Initialization
//!
//! Controller start-up: rustls setup, tracing, metrics, probe server,
//! Kubernetes client, key service credentials and the reconciler context.

use crate::config::{ControllerArgs, ControllerConfig};
use crate::controller::decryption::KeyServices;
use crate::controller::reconciler::{KubeStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::SopsSecret;
use crate::observability;
use anyhow::{Context, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// SopsSecrets in the watched scope
    pub sops_secrets: Api<SopsSecret>,
    /// Secrets in the watched scope
    pub secrets: Api<Secret>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Effective configuration (environment overlaid with flags)
    pub config: Arc<ControllerConfig>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Configuration (environment, then command-line flags)
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Key service credentials
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // Another component already installed a provider; keep it
        eprintln!("rustls crypto provider already installed, keeping the existing one");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sops_secrets_controller=info".into()),
        )
        .init();

    info!("Starting SopsSecret controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = Arc::new(ControllerArgs::parse().apply(ControllerConfig::from_env()));
    info!(
        requeue_decrypt_after_minutes = config.requeue_decrypt_after_minutes,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        requeue_unknown_errors_immediately = config.requeue_unknown_errors_immediately,
        store_timeout_secs = config.store_timeout_secs,
        "Loaded controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    // Start the probe server in the background and wait for it to bind
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (sops_secrets, secrets): (Api<SopsSecret>, Api<Secret>) = match &config.watch_namespace {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client.clone(), namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let key_services =
        Arc::new(KeyServices::from_env().context("Failed to load key service credentials")?);

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        key_services,
        Arc::clone(&config),
    ));

    check_crd_queryable(&sops_secrets).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        sops_secrets,
        secrets,
        reconciler,
        server_state,
        config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log a per-namespace summary of existing SopsSecrets, or a hint when the CRD is missing
///
/// The controller's initial list reconciles every existing resource, so nothing is
/// reconciled here. A failure is not fatal; the watch keeps retrying.
async fn check_crd_queryable(sops_secrets: &Api<SopsSecret>) {
    let span = tracing::info_span!(
        "controller.startup.check_crd",
        operation = "check_crd_queryable"
    );

    async {
        match sops_secrets.list(&ListParams::default()).await {
            Ok(list) => {
                let mut by_namespace: BTreeMap<String, usize> = BTreeMap::new();
                for item in &list.items {
                    let namespace = item.metadata.namespace.clone().unwrap_or_default();
                    *by_namespace.entry(namespace).or_default() += 1;
                }

                info!(
                    "CRD is queryable, found {} existing SopsSecret resources in {} namespaces",
                    list.items.len(),
                    by_namespace.len()
                );
                for (namespace, count) in &by_namespace {
                    info!("  {}: {}", namespace, count);
                }
            }
            Err(e) => {
                error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
                error!("Installation: kubectl apply -f config/crd/isindir.github.com_sopssecrets.yaml");
                warn!("Continuing despite CRD queryability check failure - controller will retry");
            }
        }
    }
    .instrument(span)
    .await;
}
