//! # Watch Loop
//!
//! Controller watch loop that monitors SopsSecret resources, and the Secrets they own,
//! and triggers reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::constants::{WATCH_BACKOFF_MAX_MS, WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::SopsSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Watches SopsSecrets and the Secrets they control, so a deleted or edited child
/// Secret triggers a reconcile of its owner. Reconciles run with the configured
/// concurrency limit. The watch restarts on stream errors until a shutdown signal
/// marks the server as not ready.
pub async fn run_watch_loop(
    sops_secrets: Api<SopsSecret>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: Arc<ControllerConfig>,
) -> anyhow::Result<()> {
    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        concurrency = config.max_concurrent_reconciles,
        "Starting controller watch loop..."
    );

    let backoff_duration_ms = Arc::new(AtomicU64::new(WATCH_BACKOFF_START_MS));

    // Kubernetes sends SIGTERM; mark not ready so probes fail while in-flight reconciles drain
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
        shutdown_tx.send_replace(true);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let watch_restart_delay = config.watch_restart_delay_duration();
        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");

        Controller::new(sops_secrets.clone(), watcher::Config::default().any_semantic())
            .owns(secrets.clone(), watcher::Config::default())
            .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciles))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &event {
                        Ok((object, action)) => {
                            backoff.store(WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                            debug!(object = %object, action = ?action, "watch.event.reconciled");
                            Some(event)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                WATCH_BACKOFF_MAX_MS,
                                watch_restart_delay,
                            )
                            .await
                            .map(|()| event)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        let delay = config.watch_restart_delay_after_end_duration();
        if !wait_before_restart(&server_state, &mut shutdown_rx, delay).await {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
///
/// A signal whose handler cannot be installed never resolves, so the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown..."),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

/// Decide whether to restart the watch after its stream ended
///
/// The controller stream also ends when it sees the shutdown signal, possibly before the
/// signal task has cleared readiness, so the restart delay is cut short by a shutdown.
/// Returns `false` when the loop should exit.
async fn wait_before_restart(
    server_state: &ServerState,
    shutdown: &mut watch::Receiver<bool>,
    delay: Duration,
) -> bool {
    if !server_state.is_ready.load(Ordering::Relaxed) || *shutdown.borrow() {
        return false;
    }

    warn!(
        "Controller watch stream ended, restarting in {} seconds...",
        delay.as_secs()
    );
    tokio::select! {
        () = tokio::time::sleep(delay) => server_state.is_ready.load(Ordering::Relaxed),
        Ok(()) = shutdown.changed() => false,
    }
}
