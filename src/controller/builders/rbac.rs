//! Identity and authorization objects for the Dex workload.
//!
//! The names are fixed, so every DexServer in a namespace shares one
//! ServiceAccount and every DexServer in the cluster shares one ClusterRole.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};

use super::{app_labels, InstanceMeta};
use crate::constants::SERVICE_ACCOUNT_NAME;

pub fn service_account(meta: &InstanceMeta) -> ServiceAccount {
    ServiceAccount {
        metadata: meta.namespaced_meta(SERVICE_ACCOUNT_NAME, Some(app_labels(&meta.name))),
        ..ServiceAccount::default()
    }
}

/// Full access to Dex's own storage CRDs plus permission to install them
///
/// Cluster-scoped: outlives its `DexServer`, see `InstanceMeta::cluster_meta`.
pub fn cluster_role(meta: &InstanceMeta) -> ClusterRole {
    ClusterRole {
        metadata: meta.cluster_meta(SERVICE_ACCOUNT_NAME),
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec!["dex.coreos.com".to_string()]),
                resources: Some(vec!["*".to_string()]),
                verbs: vec!["*".to_string()],
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["apiextensions.k8s.io".to_string()]),
                resources: Some(vec!["customresourcedefinitions".to_string()]),
                verbs: vec!["create".to_string()],
                ..PolicyRule::default()
            },
        ]),
        ..ClusterRole::default()
    }
}

pub fn cluster_role_binding_name(namespace: &str) -> String {
    format!("{SERVICE_ACCOUNT_NAME}-{namespace}")
}

pub fn cluster_role_binding(meta: &InstanceMeta) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: meta.cluster_meta(&cluster_role_binding_name(&meta.namespace)),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(meta.namespace.clone()),
            ..Subject::default()
        }]),
    }
}
