//! # Resource Builders
//!
//! Pure functions from a `DexServer` to each object the controller creates.
//!
//! Builders perform no I/O. The only inputs beyond the instance itself are
//! collaborator outputs (mTLS material, rendered configuration) and the Dex
//! image, all passed in explicitly. A builder that cannot produce a complete
//! object returns a [`BuildError`]; nothing partial is ever handed to create.

mod config_map;
mod deployment;
mod labels;
mod rbac;
mod route;
mod secret;
mod service;

pub use config_map::config_map;
pub use deployment::deployment;
pub use labels::{app_labels, instance_labels};
pub use rbac::{cluster_role, cluster_role_binding, cluster_role_binding_name, service_account};
pub use route::{route, route_host};
pub use secret::mtls_secret;
pub use service::{grpc_service, primary_service, web_tls_secret_name};

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use thiserror::Error;

use crate::constants::DEX_IMAGE_ENV_NAME;
use crate::crd::DexServer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("DexServer is missing metadata.{0}")]
    MissingMetadata(&'static str),

    #[error("required environment variable {DEX_IMAGE_ENV_NAME} is empty or not set")]
    MissingImage,

    #[error("issuer '{issuer}' is not a valid URL with a host: {reason}")]
    InvalidIssuer { issuer: String, reason: String },
}

/// Identity of the DexServer being reconciled, shared by every builder
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMeta {
    pub name: String,
    pub namespace: String,
    pub issuer: String,
    pub owner: OwnerReference,
}

impl InstanceMeta {
    pub fn from_instance(instance: &DexServer) -> Result<Self, BuildError> {
        let name = instance
            .metadata
            .name
            .clone()
            .ok_or(BuildError::MissingMetadata("name"))?;
        let namespace = instance
            .namespace()
            .ok_or(BuildError::MissingMetadata("namespace"))?;
        let owner = instance
            .controller_owner_ref(&())
            .ok_or(BuildError::MissingMetadata("uid"))?;
        Ok(Self {
            name,
            namespace,
            issuer: instance.spec.issuer.clone(),
            owner,
        })
    }

    /// Metadata for a namespaced object owned by this instance
    pub(crate) fn namespaced_meta(
        &self,
        name: &str,
        labels: Option<BTreeMap<String, String>>,
    ) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels,
            owner_references: Some(vec![self.owner.clone()]),
            ..ObjectMeta::default()
        }
    }

    /// Metadata for a cluster-scoped object owned by this instance
    ///
    /// The owner reference names a namespaced `DexServer`. The garbage
    /// collector cannot resolve a namespaced owner from a cluster-scoped
    /// dependent, so the ClusterRole and ClusterRoleBinding are not removed
    /// with their `DexServer` and must be deleted by hand.
    pub(crate) fn cluster_meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            owner_references: Some(vec![self.owner.clone()]),
            ..ObjectMeta::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::crd::DexServerSpec;

    pub fn dex_server(name: &str, namespace: &str, issuer: &str) -> DexServer {
        let mut instance = DexServer::new(
            name,
            DexServerSpec {
                issuer: issuer.to_string(),
                connectors: Vec::new(),
            },
        );
        instance.metadata.namespace = Some(namespace.to_string());
        instance.metadata.uid = Some("0a1b2c3d-0000-4000-8000-000000000001".to_string());
        instance
    }

    pub fn meta() -> InstanceMeta {
        InstanceMeta::from_instance(&dex_server("dex", "dex-system", "https://sso.example.com/"))
            .unwrap()
    }
}
