// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster object store abstraction.
//!
//! The reconciler never talks to `kube::Api` directly. Every read and write
//! goes through [`ObjectStore`], which is generic over any typed Kubernetes
//! resource. Two implementations exist:
//!
//! - [`KubeStore`] - backed by the Kubernetes API, with retries on transient errors
//! - [`MemoryStore`] - in-process store with optimistic concurrency, used by tests
//!
//! Namespaces are passed explicitly: `None` addresses cluster-scoped objects
//! (or, for [`ObjectStore::list`], all namespaces).

use crate::errors::StoreError;
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, Operation};

/// Any typed resource the store can hold.
pub trait StoredObject:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoredObject for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Generic get/list/create/update/delete over typed resources.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single object.
    async fn get<K: StoredObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<K, StoreError>;

    /// List objects of a kind, in one namespace or across all of them.
    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Create an object. Fails with [`StoreError::Conflict`] if it already exists.
    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Replace an object. A set `resourceVersion` must match the stored one.
    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Delete an object.
    async fn delete<K: StoredObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<(), StoreError>;

    /// Write only the status subresource of an object.
    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, StoreError>;
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for Arc<S> {
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        (**self).get(namespace, name).await
    }

    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        (**self).list(namespace).await
    }

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        (**self).create(object).await
    }

    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        (**self).update(object).await
    }

    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        (**self).delete::<K>(namespace, name).await
    }

    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        (**self).update_status(object).await
    }
}

/// Fetch an object, mapping [`StoreError::NotFound`] to `None`.
///
/// # Errors
///
/// Returns any store error other than not found.
pub async fn get_optional<K, S>(
    store: &S,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>, StoreError>
where
    K: StoredObject,
    S: ObjectStore,
{
    match store.get::<K>(namespace, name).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Plural resource name of `K`, as used in error messages.
pub(crate) fn plural<K: StoredObject>() -> String {
    K::plural(&()).into_owned()
}
