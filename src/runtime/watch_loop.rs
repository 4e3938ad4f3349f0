//! # Watch Loop
//!
//! Runs the kube-runtime controller for DexServer resources and the objects
//! they own, until SIGTERM or Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::{Client, Resource};
use kube_runtime::controller::Controller;
use kube_runtime::watcher;
use tracing::{debug, info, warn};

use super::error_policy::error_policy;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::{DexServer, Route};

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the controller until a shutdown signal arrives
///
/// Cancels the reconciler's shutdown token on exit so in-flight passes and the
/// HTTP server stop as well.
pub async fn run_watch_loop(client: Client, reconciler: Arc<Reconciler>) -> Result<()> {
    let namespace = reconciler.config.watch_namespace.clone();
    let ns = namespace.as_deref();
    match ns {
        Some(ns) => info!("Watching DexServer resources in namespace {}", ns),
        None => info!("Watching DexServer resources in all namespaces"),
    }

    let dex_servers: Api<DexServer> = scoped_api(&client, ns);
    let shutdown = reconciler.shutdown.clone();

    Controller::new(dex_servers, watcher::Config::default())
        .owns(scoped_api::<ConfigMap>(&client, ns), watcher::Config::default())
        .owns(scoped_api::<Service>(&client, ns), watcher::Config::default())
        .owns(scoped_api::<ServiceAccount>(&client, ns), watcher::Config::default())
        .owns(scoped_api::<Secret>(&client, ns), watcher::Config::default())
        .owns(scoped_api::<Deployment>(&client, ns), watcher::Config::default())
        .owns(scoped_api::<Route>(&client, ns), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(resource = %object, ?action, "Reconciled");
                }
                Err(e) => warn!("Controller stream error: {}", e),
            }
        })
        .await;

    info!("Controller stopped, shutting down");
    shutdown.cancel();
    Ok(())
}
