// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] backed by the Kubernetes API.
//!
//! Typed objects are converted to `DynamicObject` so that a single code path
//! serves both namespaced and cluster-scoped kinds. Transient API errors are
//! retried with [`retry_api_call`].

use super::{plural, ObjectStore, StoredObject};
use crate::errors::StoreError;
use crate::reconcilers::retry::retry_api_call;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Kubernetes-backed object store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoredObject>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn serde_error<K: StoredObject>(
    operation: &str,
    name: &str,
    err: &serde_json::Error,
) -> StoreError {
    StoreError::Api {
        operation: operation.to_string(),
        resource: plural::<K>(),
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn to_dynamic<K: StoredObject>(object: &K) -> Result<DynamicObject, StoreError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| serde_error::<K>("encode", &object.name_any(), &e))
}

fn from_dynamic<K: StoredObject>(object: DynamicObject) -> Result<K, StoreError> {
    let name = object.name_any();
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| serde_error::<K>("decode", &name, &e))
}

fn map_error<K: StoredObject>(operation: &str, name: &str, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            resource: plural::<K>(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            resource: plural::<K>(),
            name: name.to_string(),
            message: ae.message,
        },
        other => StoreError::Api {
            operation: operation.to_string(),
            resource: plural::<K>(),
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let api = self.api::<K>(namespace);
        let op = format!("get {} {}", K::kind(&()), name);
        let object = retry_api_call(|| api.get(name), &op)
            .await
            .map_err(|e| map_error::<K>("get", name, e))?;
        from_dynamic(object)
    }

    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let api = self.api::<K>(namespace);
        let op = format!("list {}", K::kind(&()));
        let params = ListParams::default();
        let list = retry_api_call(|| api.list(&params), &op)
            .await
            .map_err(|e| map_error::<K>("list", "", e))?;
        list.items.into_iter().map(from_dynamic).collect()
    }

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        let api = self.api::<K>(object.namespace().as_deref());
        let body = to_dynamic(object)?;
        let params = PostParams::default();
        let op = format!("create {} {}", K::kind(&()), name);
        let created = retry_api_call(|| api.create(&params, &body), &op)
            .await
            .map_err(|e| map_error::<K>("create", &name, e))?;
        debug!(kind = %K::kind(&()), name = %name, "Created object");
        from_dynamic(created)
    }

    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        let api = self.api::<K>(object.namespace().as_deref());
        let body = to_dynamic(object)?;
        let params = PostParams::default();
        let op = format!("replace {} {}", K::kind(&()), name);
        let updated = retry_api_call(|| api.replace(&name, &params, &body), &op)
            .await
            .map_err(|e| map_error::<K>("update", &name, e))?;
        debug!(kind = %K::kind(&()), name = %name, "Replaced object");
        from_dynamic(updated)
    }

    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let api = self.api::<K>(namespace);
        let params = DeleteParams::background();
        let op = format!("delete {} {}", K::kind(&()), name);
        retry_api_call(|| api.delete(name, &params), &op)
            .await
            .map_err(|e| map_error::<K>("delete", name, e))?;
        Ok(())
    }

    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        let api = self.api::<K>(object.namespace().as_deref());
        let value =
            serde_json::to_value(object).map_err(|e| serde_error::<K>("encode", &name, &e))?;
        let patch = json!({ "status": value.get("status").cloned().unwrap_or_default() });
        let params = PatchParams::default();
        let patch = Patch::Merge(&patch);
        let op = format!("patch status {} {}", K::kind(&()), name);
        let patched = retry_api_call(|| api.patch_status(&name, &params, &patch), &op)
        .await
        .map_err(|e| map_error::<K>("update status", &name, e))?;
        from_dynamic(patched)
    }
}
