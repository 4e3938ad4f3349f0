//! # Dex Operator
//!
//! A Kubernetes controller that bootstraps Dex SSO servers from `DexServer`
//! resources.
//!
//! ## Overview
//!
//! For each `DexServer` the controller creates, one step per pass:
//!
//! 1. **gRPC mTLS secret** - fresh CA, server and client certificates
//! 2. **Dex configuration** - `config.yaml` rendered from the declared connectors,
//!    with connector credentials read from referenced secrets
//! 3. **Services** - web (5556) and gRPC (5557) listeners
//! 4. **RBAC** - ServiceAccount, ClusterRole and ClusterRoleBinding for Dex
//! 5. **Deployment** - the Dex server itself
//! 6. **Route** - public OpenShift route for the issuer host
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for deployment and configuration.

use anyhow::Result;

use dex_operator::runtime::initialization::initialize;
use dex_operator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(init_result.client, init_result.reconciler).await?;

    // The watch loop cancelled the shutdown token; wait for the HTTP server to drain
    if let Err(e) = init_result.server_handle.await {
        tracing::warn!("HTTP server task ended abnormally: {}", e);
    }

    Ok(())
}
