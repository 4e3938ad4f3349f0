//! Shared fixtures for integration tests: an in-memory `ClusterStore` and
//! DexServer builders.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tokio::sync::Barrier;

use dex_operator::controller::store::{ClusterStore, ManagedObject, ObjectKey, ObjectKind, StoreError};
use dex_operator::crd::{
    ConnectorSpec, DexServer, DexServerSpec, GitHubConfigSpec, LdapConfigSpec, SecretKeyRef,
};

pub const NAMESPACE: &str = "dex-system";
pub const ISSUER: &str = "https://sso.example.com/";
pub const DEX_IMAGE: &str = "quay.io/dexidp/dex:v2.37.0";

/// In-memory cluster with failure injection
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<ObjectKey, ManagedObject>>,
    creations: Mutex<Vec<ObjectKey>>,
    failing_fetch: Mutex<BTreeSet<ObjectKind>>,
    failing_keys: Mutex<BTreeSet<ObjectKey>>,
    concurrent_creator: Mutex<BTreeSet<ObjectKey>>,
    fetch_barrier: Mutex<Option<(ObjectKind, Arc<Barrier>)>>,
    hang: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, object: ManagedObject) {
        self.objects
            .lock()
            .unwrap()
            .insert(object.key(), object);
    }

    pub fn get(&self, key: &ObjectKey) -> Option<ManagedObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Keys in the order the engine created them
    pub fn creations(&self) -> Vec<ObjectKey> {
        self.creations.lock().unwrap().clone()
    }

    /// Fetches of `kind` fail with a transport error
    pub fn fail_fetches_of(&self, kind: ObjectKind) {
        self.failing_fetch.lock().unwrap().insert(kind);
    }

    /// Fetches of `key` fail with a transport error
    pub fn fail_fetch_of(&self, key: ObjectKey) {
        self.failing_keys.lock().unwrap().insert(key);
    }

    /// Another writer creates `key` just before the engine does
    pub fn race_create_of(&self, key: ObjectKey) {
        self.concurrent_creator.lock().unwrap().insert(key);
    }

    /// Fetches of `kind` that find nothing wait until `parties` fetches have
    /// reached the same point
    pub fn sync_missing_fetches_of(&self, kind: ObjectKind, parties: usize) {
        *self.fetch_barrier.lock().unwrap() = Some((kind, Arc::new(Barrier::new(parties))));
    }

    /// Every call blocks forever
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }
}

pub fn transport_error() -> StoreError {
    StoreError::Api(kube::Error::Service(Box::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    ))))
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn fetch(&self, key: &ObjectKey) -> Result<ManagedObject, StoreError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing_fetch.lock().unwrap().contains(&key.kind)
            || self.failing_keys.lock().unwrap().contains(key)
        {
            return Err(transport_error());
        }
        let found = self.objects.lock().unwrap().get(key).cloned();
        match found {
            Some(object) => Ok(object),
            None => {
                let barrier = self
                    .fetch_barrier
                    .lock()
                    .unwrap()
                    .as_ref()
                    .filter(|(kind, _)| *kind == key.kind)
                    .map(|(_, barrier)| barrier.clone());
                if let Some(barrier) = barrier {
                    barrier.wait().await;
                }
                Err(StoreError::NotFound(key.clone()))
            }
        }
    }

    async fn create(&self, object: &ManagedObject) -> Result<(), StoreError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let key = object.key();
        let mut objects = self.objects.lock().unwrap();
        if self.concurrent_creator.lock().unwrap().remove(&key) {
            objects.insert(key.clone(), object.clone());
        }
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        objects.insert(key.clone(), object.clone());
        self.creations.lock().unwrap().push(key);
        Ok(())
    }
}

pub fn dex_server(issuer: &str, connectors: Vec<ConnectorSpec>) -> DexServer {
    let mut instance = DexServer::new(
        "dex",
        DexServerSpec {
            issuer: issuer.to_string(),
            connectors,
        },
    );
    instance.metadata.namespace = Some(NAMESPACE.to_string());
    instance.metadata.uid = Some("6f1c2d4e-1111-4222-8333-944455556666".to_string());
    instance
}

pub fn github_connector(secret_name: &str, key: Option<&str>) -> ConnectorSpec {
    ConnectorSpec::github(
        "gh",
        "GitHub",
        GitHubConfigSpec {
            client_id: "abc".to_string(),
            client_secret_ref: SecretKeyRef {
                name: secret_name.to_string(),
                namespace: None,
                key: key.map(str::to_string),
            },
            redirect_uri: "https://sso.example.com/callback".to_string(),
            org: Some("example".to_string()),
            ..GitHubConfigSpec::default()
        },
    )
}

pub fn ldap_connector(secret_name: &str) -> ConnectorSpec {
    ConnectorSpec::ldap(
        "corp",
        "Corporate LDAP",
        LdapConfigSpec {
            host: "ldap.example.com:636".to_string(),
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            bind_pw_ref: SecretKeyRef {
                name: secret_name.to_string(),
                ..SecretKeyRef::default()
            },
            ..LdapConfigSpec::default()
        },
    )
}

pub fn secret(namespace: &str, name: &str, data: &[(&str, &[u8])]) -> ManagedObject {
    ManagedObject::Secret(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.to_vec())))
                .collect(),
        ),
        ..Secret::default()
    })
}

pub fn key(kind: ObjectKind, name: &str) -> ObjectKey {
    if kind.is_cluster_scoped() {
        ObjectKey::cluster(kind, name)
    } else {
        ObjectKey::namespaced(kind, name, NAMESPACE)
    }
}
