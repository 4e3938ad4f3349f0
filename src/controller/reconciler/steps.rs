//! # Bootstrap Steps
//!
//! The fixed, ordered table of objects a DexServer needs. Each step names the
//! objects it is responsible for; the engine creates the missing objects of the
//! first incomplete step and stops.

use std::fmt;

use crate::constants::{GRPC_SERVICE_NAME, MTLS_SECRET_NAME, SERVICE_ACCOUNT_NAME};
use crate::controller::builders::{cluster_role_binding_name, InstanceMeta};
use crate::controller::store::{ObjectKey, ObjectKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    MtlsSecret,
    ConfigMap,
    Services,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    Deployment,
    Route,
}

impl BootstrapStep {
    /// Creation order
    pub const ORDER: [BootstrapStep; 8] = [
        BootstrapStep::MtlsSecret,
        BootstrapStep::ConfigMap,
        BootstrapStep::Services,
        BootstrapStep::ServiceAccount,
        BootstrapStep::ClusterRole,
        BootstrapStep::ClusterRoleBinding,
        BootstrapStep::Deployment,
        BootstrapStep::Route,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BootstrapStep::MtlsSecret => "mtls-secret",
            BootstrapStep::ConfigMap => "config-map",
            BootstrapStep::Services => "services",
            BootstrapStep::ServiceAccount => "service-account",
            BootstrapStep::ClusterRole => "cluster-role",
            BootstrapStep::ClusterRoleBinding => "cluster-role-binding",
            BootstrapStep::Deployment => "deployment",
            BootstrapStep::Route => "route",
        }
    }

    /// Objects this step is responsible for
    pub fn targets(self, meta: &InstanceMeta) -> Vec<ObjectKey> {
        let ns = meta.namespace.as_str();
        match self {
            BootstrapStep::MtlsSecret => {
                vec![ObjectKey::namespaced(ObjectKind::Secret, MTLS_SECRET_NAME, ns)]
            }
            BootstrapStep::ConfigMap => {
                vec![ObjectKey::namespaced(ObjectKind::ConfigMap, &meta.name, ns)]
            }
            BootstrapStep::Services => vec![
                ObjectKey::namespaced(ObjectKind::Service, &meta.name, ns),
                ObjectKey::namespaced(ObjectKind::Service, GRPC_SERVICE_NAME, ns),
            ],
            BootstrapStep::ServiceAccount => vec![ObjectKey::namespaced(
                ObjectKind::ServiceAccount,
                SERVICE_ACCOUNT_NAME,
                ns,
            )],
            BootstrapStep::ClusterRole => {
                vec![ObjectKey::cluster(ObjectKind::ClusterRole, SERVICE_ACCOUNT_NAME)]
            }
            BootstrapStep::ClusterRoleBinding => vec![ObjectKey::cluster(
                ObjectKind::ClusterRoleBinding,
                cluster_role_binding_name(ns),
            )],
            BootstrapStep::Deployment => {
                vec![ObjectKey::namespaced(ObjectKind::Deployment, &meta.name, ns)]
            }
            BootstrapStep::Route => {
                vec![ObjectKey::namespaced(ObjectKind::Route, &meta.name, ns)]
            }
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
