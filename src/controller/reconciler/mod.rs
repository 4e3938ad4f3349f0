//! # Reconciler
//!
//! Entry point invoked by the kube-runtime controller for each DexServer.
//!
//! A pass runs the [`BootstrapEngine`] under a cancellation token that fires on
//! the reconcile timeout or on controller shutdown. The outcome decides the
//! next action:
//!
//! - objects were created: requeue shortly to move on to the next step
//! - everything exists: wait for the next change
//! - error: hand over to the error policy in `runtime::error_policy`

mod engine;
mod error;
mod steps;

pub use engine::{BootstrapEngine, PassOutcome};
pub use error::ReconcilerError;
pub use steps::BootstrapStep;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::store::{ClusterStore, KubeStore};
use crate::crd::DexServer;
use crate::observability;

/// Per-resource error backoff
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Shared reconciliation context
#[derive(Debug)]
pub struct Reconciler {
    pub engine: BootstrapEngine,
    pub config: ControllerConfig,
    /// Keyed by `namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
    /// Cancelled on controller shutdown; every pass runs under a child token
    pub shutdown: CancellationToken,
}

impl Reconciler {
    /// Context backed by the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig, shutdown: CancellationToken) -> Self {
        Self::with_store(Arc::new(KubeStore::new(client)), config, shutdown)
    }

    pub fn with_store(
        store: Arc<dyn ClusterStore>,
        config: ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine: BootstrapEngine::new(store, config.dex_image.clone()),
            config,
            backoff_states: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn reset_backoff(&self, resource_key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(resource_key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}

pub fn resource_key(instance: &DexServer) -> String {
    format!(
        "{}/{}",
        instance.namespace().unwrap_or_default(),
        instance.name_any()
    )
}

/// Reconcile one DexServer
pub async fn reconcile(
    instance: Arc<DexServer>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = instance.name_any();
    let namespace = instance.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace
    );

    async move {
        observability::metrics::increment_reconciliations();
        let started = Instant::now();

        let cancel = ctx.shutdown.child_token();
        let timeout = Duration::from_secs(ctx.config.reconcile_timeout_secs);
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };
        let result = ctx.engine.run(&instance, &cancel).await;
        timer.abort();

        observability::metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&resource_key(&instance));
        match outcome {
            PassOutcome::Advanced {
                step,
                created,
                conflicted,
            } => {
                info!(
                    step = %step,
                    created = created.len(),
                    conflicted = conflicted.len(),
                    "✅ Step {} complete, requeueing",
                    step
                );
                observability::metrics::increment_requeues_total("step-advanced");
                Ok(Action::requeue(Duration::from_secs(
                    ctx.config.step_requeue_secs,
                )))
            }
            PassOutcome::Converged => {
                info!("✅ All Dex objects present");
                Ok(Action::await_change())
            }
        }
    }
    .instrument(span)
    .await
}
