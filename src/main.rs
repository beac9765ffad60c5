//! # SopsSecret Controller
//!
//! Kubernetes controller that decrypts `SopsSecret` resources into managed Secrets.

use anyhow::Result;
use sops_secrets_controller::runtime::initialization::initialize;
use sops_secrets_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.sops_secrets,
        init.secrets,
        init.reconciler,
        init.server_state,
        init.config,
    )
    .await
}
