//! # Secret Reference Resolver
//!
//! Turns a connector's [`SecretKeyRef`] into the credential it points at.
//!
//! One fetch and one field lookup per reference. Every way a reference can
//! fail to produce a usable value has its own variant; an empty string is
//! never substituted for a missing credential.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use super::store::{cancellable, ClusterStore, ManagedObject, ObjectKey, ObjectKind, StoreError};
use crate::crd::SecretKeyRef;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("secret {namespace}/{name} has no field '{key}'")]
    KeyMissing {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("field '{key}' of secret {namespace}/{name} is not valid UTF-8")]
    NotUtf8 {
        namespace: String,
        name: String,
        key: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("field '{key}' of secret {namespace}/{name} is empty")]
    EmptyValue {
        namespace: String,
        name: String,
        key: String,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl ResolveError {
    /// Failures that may succeed on retry without any input changing
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::Store(_))
    }
}

/// Resolves secret references on behalf of one DexServer
pub struct SecretResolver<'a> {
    store: &'a dyn ClusterStore,
    default_namespace: &'a str,
    cancel: &'a CancellationToken,
}

impl std::fmt::Debug for SecretResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver")
            .field("default_namespace", &self.default_namespace)
            .finish_non_exhaustive()
    }
}

impl<'a> SecretResolver<'a> {
    pub fn new(
        store: &'a dyn ClusterStore,
        default_namespace: &'a str,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            default_namespace,
            cancel,
        }
    }

    /// Read the field named by `reference`, or `default_key` if it names none
    pub async fn resolve(
        &self,
        reference: &SecretKeyRef,
        default_key: &str,
    ) -> Result<Zeroizing<String>, ResolveError> {
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(self.default_namespace);
        let key = reference
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(default_key);
        let object_key = ObjectKey::namespaced(ObjectKind::Secret, &reference.name, namespace);

        let secret = match cancellable(self.cancel, self.store.fetch(&object_key)).await {
            Ok(ManagedObject::Secret(secret)) => secret,
            Ok(_) | Err(StoreError::NotFound(_)) => {
                return Err(ResolveError::SecretNotFound {
                    namespace: namespace.to_string(),
                    name: reference.name.clone(),
                })
            }
            Err(e) => return Err(ResolveError::Store(e)),
        };

        let bytes = secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|value| Zeroizing::new(value.0.clone()))
            .ok_or_else(|| ResolveError::KeyMissing {
                namespace: namespace.to_string(),
                name: reference.name.clone(),
                key: key.to_string(),
            })?;

        let value = std::str::from_utf8(&bytes).map_err(|source| ResolveError::NotUtf8 {
            namespace: namespace.to_string(),
            name: reference.name.clone(),
            key: key.to_string(),
            source,
        })?;

        if value.is_empty() {
            return Err(ResolveError::EmptyValue {
                namespace: namespace.to_string(),
                name: reference.name.clone(),
                key: key.to_string(),
            });
        }

        Ok(Zeroizing::new(value.to_string()))
    }
}
