//! # Reconciler Configuration
//!
//! Settings that shape how DexServer resources are reconciled.

use super::{env_lookup, var_or_default};
use crate::constants::{
    DEFAULT_ERROR_BACKOFF_MAX_SECS, DEFAULT_ERROR_BACKOFF_MIN_SECS,
    DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_STEP_REQUEUE_SECS, DEX_IMAGE_ENV_NAME,
};

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Dex container image
    /// `None` until `RELATED_IMAGE_DEX` is set; the deployment step fails without it
    pub dex_image: Option<String>,
    /// Restrict the controller to one namespace
    /// `None` watches DexServer resources cluster-wide
    pub watch_namespace: Option<String>,
    /// Upper bound on a single reconciliation pass (seconds)
    pub reconcile_timeout_secs: u64,
    /// Requeue delay after a pass that created objects (seconds)
    pub step_requeue_secs: u64,
    /// Error backoff lower bound (seconds)
    pub error_backoff_min_secs: u64,
    /// Error backoff upper bound (seconds)
    pub error_backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dex_image: None,
            watch_namespace: None,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            step_requeue_secs: DEFAULT_STEP_REQUEUE_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let error_backoff_min_secs = var_or_default(
            &lookup,
            "ERROR_BACKOFF_MIN_SECS",
            DEFAULT_ERROR_BACKOFF_MIN_SECS,
        )
        .max(1);
        let error_backoff_max_secs = var_or_default(
            &lookup,
            "ERROR_BACKOFF_MAX_SECS",
            DEFAULT_ERROR_BACKOFF_MAX_SECS,
        )
        .max(error_backoff_min_secs);

        Self {
            dex_image: non_empty(DEX_IMAGE_ENV_NAME),
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            reconcile_timeout_secs: var_or_default(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            )
            .max(1),
            step_requeue_secs: var_or_default(
                &lookup,
                "STEP_REQUEUE_SECS",
                DEFAULT_STEP_REQUEUE_SECS,
            ),
            error_backoff_min_secs,
            error_backoff_max_secs,
        }
    }
}
