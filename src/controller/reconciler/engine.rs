//! # Bootstrap Engine
//!
//! One pass over the step table: find the first step with a missing object,
//! build that step's missing objects, create them and report back. A pass
//! never compares or updates objects that already exist.
//!
//! Creates that race another pass and come back `AlreadyExists` count as done.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::ReconcilerError;
use super::steps::BootstrapStep;
use crate::controller::builders::{self, InstanceMeta};
use crate::controller::dex_config;
use crate::controller::mtls::MtlsBundle;
use crate::controller::oracle;
use crate::controller::resolver::SecretResolver;
use crate::controller::store::{cancellable, ClusterStore, ManagedObject, ObjectKey, StoreError};
use crate::crd::DexServer;
use crate::observability;

/// Result of one successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every object exists; nothing was done
    Converged,
    /// `step` was missing objects; they now exist
    Advanced {
        step: BootstrapStep,
        /// Created by this pass
        created: Vec<ObjectKey>,
        /// Already created by a concurrent pass
        conflicted: Vec<ObjectKey>,
    },
}

/// Drives a DexServer through the bootstrap steps
#[derive(Clone)]
pub struct BootstrapEngine {
    store: Arc<dyn ClusterStore>,
    dex_image: Option<String>,
}

impl std::fmt::Debug for BootstrapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapEngine")
            .field("dex_image", &self.dex_image)
            .finish_non_exhaustive()
    }
}

impl BootstrapEngine {
    pub fn new(store: Arc<dyn ClusterStore>, dex_image: Option<String>) -> Self {
        Self { store, dex_image }
    }

    /// Run one pass for `instance`
    pub async fn run(
        &self,
        instance: &DexServer,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, ReconcilerError> {
        let meta = InstanceMeta::from_instance(instance).map_err(ReconcilerError::Instance)?;

        for step in BootstrapStep::ORDER {
            let targets = step.targets(&meta);
            let missing = oracle::missing(self.store.as_ref(), &targets, cancel)
                .await
                .map_err(ReconcilerError::from_store)?;
            if missing.is_empty() {
                debug!(step = %step, "Step already satisfied");
                continue;
            }

            let objects = self.build(step, &meta, instance, &missing, cancel).await?;
            return self.create_all(step, &objects, cancel).await;
        }

        Ok(PassOutcome::Converged)
    }

    async fn build(
        &self,
        step: BootstrapStep,
        meta: &InstanceMeta,
        instance: &DexServer,
        missing: &[ObjectKey],
        cancel: &CancellationToken,
    ) -> Result<Vec<ManagedObject>, ReconcilerError> {
        let build_error = |source| ReconcilerError::Build { step, source };
        let objects = match step {
            BootstrapStep::MtlsSecret => {
                let bundle = MtlsBundle::generate(&meta.namespace)?;
                vec![ManagedObject::Secret(builders::mtls_secret(meta, bundle))]
            }
            BootstrapStep::ConfigMap => {
                let resolver = SecretResolver::new(self.store.as_ref(), &meta.namespace, cancel);
                let rendered =
                    dex_config::translate(&meta.issuer, &instance.spec.connectors, &resolver)
                        .await
                        .map_err(ReconcilerError::from_translate)?;
                vec![ManagedObject::ConfigMap(builders::config_map(meta, &rendered))]
            }
            BootstrapStep::Services => vec![
                ManagedObject::Service(builders::primary_service(meta)),
                ManagedObject::Service(builders::grpc_service(meta)),
            ],
            BootstrapStep::ServiceAccount => {
                vec![ManagedObject::ServiceAccount(builders::service_account(meta))]
            }
            BootstrapStep::ClusterRole => {
                vec![ManagedObject::ClusterRole(builders::cluster_role(meta))]
            }
            BootstrapStep::ClusterRoleBinding => vec![ManagedObject::ClusterRoleBinding(
                builders::cluster_role_binding(meta),
            )],
            BootstrapStep::Deployment => vec![ManagedObject::Deployment(
                builders::deployment(meta, self.dex_image.as_deref()).map_err(build_error)?,
            )],
            BootstrapStep::Route => vec![ManagedObject::Route(
                builders::route(meta).map_err(build_error)?,
            )],
        };

        // Only the objects the oracle reported missing are created
        Ok(objects
            .into_iter()
            .filter(|object| missing.contains(&object.key()))
            .collect())
    }

    async fn create_all(
        &self,
        step: BootstrapStep,
        objects: &[ManagedObject],
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, ReconcilerError> {
        let mut created = Vec::new();
        let mut conflicted = Vec::new();

        for object in objects {
            let key = object.key();
            let kind = key.kind.as_str();
            info!(
                kind,
                namespace = key.namespace.as_deref().unwrap_or(""),
                name = %key.name,
                "Creating {}",
                kind
            );
            match cancellable(cancel, self.store.create(object)).await {
                Ok(()) => {
                    observability::metrics::increment_objects_created(kind);
                    created.push(key);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    info!(object = %key, "Object already exists, created by a concurrent pass");
                    observability::metrics::increment_create_conflicts(kind);
                    conflicted.push(key);
                }
                Err(e) => return Err(ReconcilerError::from_store(e)),
            }
        }

        Ok(PassOutcome::Advanced {
            step,
            created,
            conflicted,
        })
    }
}
