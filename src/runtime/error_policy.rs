//! # Error Policy
//!
//! Decides when a failed DexServer is retried.
//!
//! - Transient errors (API failures, cancellation, mTLS generation) back off
//!   per resource along a Fibonacci sequence.
//! - Configuration errors cannot succeed until the DexServer or a referenced
//!   secret changes. Changes to the DexServer trigger a new pass anyway, so
//!   only a slow safety requeue is scheduled, which also picks up fixes to
//!   referenced secrets the controller does not watch.

use std::sync::Arc;
use std::time::Duration;

use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use crate::constants::CONFIGURATION_ERROR_REQUEUE_SECS;
use crate::controller::reconciler::{resource_key, BackoffState, Reconciler, ReconcilerError};
use crate::crd::DexServer;
use crate::observability;

/// Error policy passed to `Controller::run`
pub fn error_policy(
    instance: Arc<DexServer>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = resource_key(&instance);
    observability::metrics::increment_reconciliation_errors(error.metric_label());

    if !error.is_transient() {
        error!(resource = %key, "❌ Configuration error: {}", error);
        info!(
            "Waiting for a change to {} (safety requeue in {}s)",
            key, CONFIGURATION_ERROR_REQUEUE_SECS
        );
        observability::metrics::increment_requeues_total("configuration-error");
        return Action::requeue(Duration::from_secs(CONFIGURATION_ERROR_REQUEUE_SECS));
    }

    warn!(resource = %key, "Reconciliation failed: {}", error);
    let (backoff_seconds, error_count) = next_backoff(&ctx, &key);
    let next_trigger_time =
        chrono::Utc::now() + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, next attempt {})",
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Advance the backoff of one resource
fn next_backoff(ctx: &Reconciler, key: &str) -> (u64, u32) {
    let min = ctx.config.error_backoff_min_secs;
    let max = ctx.config.error_backoff_max_secs;
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(key.to_string())
                .or_insert_with(|| BackoffState::new(min, max));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
            (min, 0)
        }
    }
}
