//! # Reconciler Errors
//!
//! Error taxonomy for a reconciliation pass and its classification for the
//! error policy.

use thiserror::Error;

use super::steps::BootstrapStep;
use crate::controller::builders::BuildError;
use crate::controller::dex_config::TranslateError;
use crate::controller::mtls::MtlsError;
use crate::controller::resolver::ResolveError;
use crate::controller::store::StoreError;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Fetch or create failed against the API server
    #[error(transparent)]
    Platform(StoreError),

    /// The DexServer itself lacks identity metadata
    #[error("invalid DexServer: {0}")]
    Instance(#[source] BuildError),

    /// A builder could not produce a complete object
    #[error("cannot build {step}: {source}")]
    Build {
        step: BootstrapStep,
        #[source]
        source: BuildError,
    },

    #[error("cannot render Dex configuration: {0}")]
    Translate(#[source] TranslateError),

    #[error("cannot generate gRPC mTLS material: {0}")]
    Mtls(#[from] MtlsError),

    /// The pass was cancelled by timeout or shutdown
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl ReconcilerError {
    pub(crate) fn from_store(error: StoreError) -> Self {
        match error {
            StoreError::Cancelled => ReconcilerError::Cancelled,
            other => ReconcilerError::Platform(other),
        }
    }

    pub(crate) fn from_translate(error: TranslateError) -> Self {
        match error {
            TranslateError::Resolve {
                source: ResolveError::Store(StoreError::Cancelled),
                ..
            } => ReconcilerError::Cancelled,
            other => ReconcilerError::Translate(other),
        }
    }

    /// Whether retrying without any input change can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcilerError::Platform(_) | ReconcilerError::Mtls(_) | ReconcilerError::Cancelled => {
                true
            }
            ReconcilerError::Translate(e) => e.is_transient(),
            ReconcilerError::Instance(_) | ReconcilerError::Build { .. } => false,
        }
    }

    /// Metric label for this error
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReconcilerError::Platform(_) => "platform",
            ReconcilerError::Mtls(_) => "mtls",
            ReconcilerError::Cancelled => "cancelled",
            ReconcilerError::Translate(e) if e.is_transient() => "platform",
            ReconcilerError::Translate(_)
            | ReconcilerError::Instance(_)
            | ReconcilerError::Build { .. } => "configuration",
        }
    }
}
