//! # Existence Oracle
//!
//! Answers "is this object already there?" for every managed kind.
//! `NotFound` is an answer, not an error; anything else propagates unchanged.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::store::{cancellable, ClusterStore, ObjectKey, StoreError};

/// Whether the object identified by `key` exists
pub async fn exists(
    store: &dyn ClusterStore,
    key: &ObjectKey,
    cancel: &CancellationToken,
) -> Result<bool, StoreError> {
    match cancellable(cancel, store.fetch(key)).await {
        Ok(_) => Ok(true),
        Err(StoreError::NotFound(_)) => {
            debug!(object = %key, "Object not found");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// The subset of `keys` that does not exist yet, in input order
pub async fn missing(
    store: &dyn ClusterStore,
    keys: &[ObjectKey],
    cancel: &CancellationToken,
) -> Result<Vec<ObjectKey>, StoreError> {
    let mut absent = Vec::new();
    for key in keys {
        if !exists(store, key, cancel).await? {
            absent.push(key.clone());
        }
    }
    Ok(absent)
}
