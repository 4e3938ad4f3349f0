//! # Cluster Store
//!
//! The narrow slice of the Kubernetes API the reconciler depends on:
//! fetch-by-identity and create. Everything above this module works against
//! the [`ClusterStore`] trait so the engine can be driven by an in-memory
//! store in tests.
//!
//! API failures are classified once, here: `404` becomes
//! [`StoreError::NotFound`], `409` becomes [`StoreError::AlreadyExists`], and
//! every other error is carried verbatim in [`StoreError::Api`].

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::constants::CONTROLLER_NAME;
use crate::crd::Route;

/// Kinds of object the controller creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Secret,
    ConfigMap,
    Service,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    Deployment,
    Route,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Secret => "Secret",
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::Service => "Service",
            ObjectKind::ServiceAccount => "ServiceAccount",
            ObjectKind::ClusterRole => "ClusterRole",
            ObjectKind::ClusterRoleBinding => "ClusterRoleBinding",
            ObjectKind::Deployment => "Deployment",
            ObjectKind::Route => "Route",
        }
    }

    pub fn is_cluster_scoped(self) -> bool {
        matches!(self, ObjectKind::ClusterRole | ObjectKind::ClusterRoleBinding)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cluster object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub name: String,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
}

impl ObjectKey {
    pub fn namespaced(kind: ObjectKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn cluster(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A fully built object of one of the managed kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedObject {
    Secret(Secret),
    ConfigMap(ConfigMap),
    Service(Service),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    Deployment(Deployment),
    Route(Route),
}

impl ManagedObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ManagedObject::Secret(_) => ObjectKind::Secret,
            ManagedObject::ConfigMap(_) => ObjectKind::ConfigMap,
            ManagedObject::Service(_) => ObjectKind::Service,
            ManagedObject::ServiceAccount(_) => ObjectKind::ServiceAccount,
            ManagedObject::ClusterRole(_) => ObjectKind::ClusterRole,
            ManagedObject::ClusterRoleBinding(_) => ObjectKind::ClusterRoleBinding,
            ManagedObject::Deployment(_) => ObjectKind::Deployment,
            ManagedObject::Route(_) => ObjectKind::Route,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ManagedObject::Secret(o) => &o.metadata,
            ManagedObject::ConfigMap(o) => &o.metadata,
            ManagedObject::Service(o) => &o.metadata,
            ManagedObject::ServiceAccount(o) => &o.metadata,
            ManagedObject::ClusterRole(o) => &o.metadata,
            ManagedObject::ClusterRoleBinding(o) => &o.metadata,
            ManagedObject::Deployment(o) => &o.metadata,
            ManagedObject::Route(o) => &o.metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey {
            kind: self.kind(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: if self.kind().is_cluster_scoped() {
                None
            } else {
                meta.namespace.clone()
            },
        }
    }
}

/// Errors from the cluster store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    #[error("request cancelled")]
    Cancelled,

    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
}

impl StoreError {
    /// Classify a kube error for the object it concerns
    pub fn from_kube(error: kube::Error, key: &ObjectKey) -> Self {
        match error {
            kube::Error::Api(ref api_err) if api_err.code == 404 => {
                StoreError::NotFound(key.clone())
            }
            kube::Error::Api(ref api_err) if api_err.code == 409 => {
                StoreError::AlreadyExists(key.clone())
            }
            other => StoreError::Api(other),
        }
    }
}

/// Fetch and create primitives against the cluster
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch the object with the given identity
    async fn fetch(&self, key: &ObjectKey) -> Result<ManagedObject, StoreError>;

    /// Create the object; fails with [`StoreError::AlreadyExists`] if it is present
    async fn create(&self, object: &ManagedObject) -> Result<(), StoreError>;
}

/// Race `operation` against `cancel`
///
/// A fired token drops the in-flight request and yields [`StoreError::Cancelled`].
pub async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StoreError::Cancelled),
        result = operation => result,
    }
}

/// [`ClusterStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, key: &ObjectKey) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match key.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }

    fn cluster<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = ()>,
    {
        Api::all(self.client.clone())
    }
}

async fn get_object<K>(api: Api<K>, key: &ObjectKey) -> Result<K, StoreError>
where
    K: Resource + Clone + DeserializeOwned + fmt::Debug,
{
    api.get(&key.name)
        .await
        .map_err(|e| StoreError::from_kube(e, key))
}

async fn create_object<K>(api: Api<K>, object: &K, key: &ObjectKey) -> Result<(), StoreError>
where
    K: Resource + Clone + Serialize + DeserializeOwned + fmt::Debug,
{
    let params = PostParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..PostParams::default()
    };
    api.create(&params, object)
        .await
        .map(|_| ())
        .map_err(|e| StoreError::from_kube(e, key))
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn fetch(&self, key: &ObjectKey) -> Result<ManagedObject, StoreError> {
        let object = match key.kind {
            ObjectKind::Secret => ManagedObject::Secret(get_object(self.namespaced(key), key).await?),
            ObjectKind::ConfigMap => {
                ManagedObject::ConfigMap(get_object(self.namespaced(key), key).await?)
            }
            ObjectKind::Service => {
                ManagedObject::Service(get_object(self.namespaced(key), key).await?)
            }
            ObjectKind::ServiceAccount => {
                ManagedObject::ServiceAccount(get_object(self.namespaced(key), key).await?)
            }
            ObjectKind::ClusterRole => {
                ManagedObject::ClusterRole(get_object(self.cluster(), key).await?)
            }
            ObjectKind::ClusterRoleBinding => {
                ManagedObject::ClusterRoleBinding(get_object(self.cluster(), key).await?)
            }
            ObjectKind::Deployment => {
                ManagedObject::Deployment(get_object(self.namespaced(key), key).await?)
            }
            ObjectKind::Route => ManagedObject::Route(get_object(self.namespaced(key), key).await?),
        };
        Ok(object)
    }

    async fn create(&self, object: &ManagedObject) -> Result<(), StoreError> {
        let key = object.key();
        match object {
            ManagedObject::Secret(o) => create_object(self.namespaced(&key), o, &key).await,
            ManagedObject::ConfigMap(o) => create_object(self.namespaced(&key), o, &key).await,
            ManagedObject::Service(o) => create_object(self.namespaced(&key), o, &key).await,
            ManagedObject::ServiceAccount(o) => {
                create_object(self.namespaced(&key), o, &key).await
            }
            ManagedObject::ClusterRole(o) => create_object(self.cluster(), o, &key).await,
            ManagedObject::ClusterRoleBinding(o) => create_object(self.cluster(), o, &key).await,
            ManagedObject::Deployment(o) => create_object(self.namespaced(&key), o, &key).await,
            ManagedObject::Route(o) => create_object(self.namespaced(&key), o, &key).await,
        }
    }
}
