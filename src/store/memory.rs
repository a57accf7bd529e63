// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`].
//!
//! Objects are held as JSON keyed by `(apiVersion, kind, namespace, name)`.
//! The store mimics the API server closely enough for reconcile tests:
//!
//! - `create` of an existing object is a [`StoreError::Conflict`]
//! - `update` with a stale `resourceVersion` is a [`StoreError::Conflict`]
//! - `update` leaves `status` alone and `update_status` touches only `status`
//! - `update` of a `Job` may not change `spec.template`
//! - every write bumps `resourceVersion`
//!
//! Calls are counted per kind and operation, and failures can be injected
//! for a specific object.

use super::{plural, ObjectStore, StoredObject};
use crate::errors::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Store operation, used for call counting and failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
    UpdateStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    api_version: String,
    kind: String,
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    fn of<K: StoredObject>(namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            namespace: namespace.map(String::from),
            name: name.to_string(),
        }
    }
}

#[derive(Debug)]
struct InjectedFailure {
    operation: Operation,
    kind: String,
    name: String,
    error: StoreError,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Value>,
    next_version: u64,
    calls: BTreeMap<(String, Operation), usize>,
    failures: Vec<InjectedFailure>,
}

impl Inner {
    fn bump_version(&mut self, value: &mut Value) {
        self.next_version += 1;
        value["metadata"]["resourceVersion"] = Value::String(self.next_version.to_string());
    }

    fn record(&mut self, kind: &str, operation: Operation) {
        *self.calls.entry((kind.to_string(), operation)).or_default() += 1;
    }

    fn injected(&self, kind: &str, name: &str, operation: Operation) -> Option<StoreError> {
        self.failures
            .iter()
            .find(|f| f.operation == operation && f.kind == kind && f.name == name)
            .map(|f| f.error.clone())
    }
}

/// In-memory object store with optimistic concurrency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn resource_version(value: &Value) -> Option<&str> {
    value["metadata"]["resourceVersion"].as_str()
}

fn encode<K: StoredObject>(object: &K) -> Result<Value, StoreError> {
    serde_json::to_value(object).map_err(|e| StoreError::Api {
        operation: "encode".to_string(),
        resource: plural::<K>(),
        name: object.meta().name.clone().unwrap_or_default(),
        message: e.to_string(),
    })
}

fn decode<K: StoredObject>(value: Value) -> Result<K, StoreError> {
    let name = value["metadata"]["name"].as_str().unwrap_or_default().to_string();
    serde_json::from_value(value).map_err(|e| StoreError::Api {
        operation: "decode".to_string(),
        resource: plural::<K>(),
        name,
        message: e.to_string(),
    })
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert or overwrite an object without counting the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized.
    pub fn seed<K: StoredObject>(&self, object: K) -> Result<(), StoreError> {
        let mut value = encode(&object)?;
        let meta = object.meta();
        let key = ObjectKey::of::<K>(
            meta.namespace.as_deref(),
            meta.name.as_deref().unwrap_or_default(),
        );
        let mut inner = self.lock();
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = Value::String(format!("uid-{}", inner.next_version + 1));
        }
        inner.bump_version(&mut value);
        inner.objects.insert(key, value);
        Ok(())
    }

    /// Read an object without counting the call.
    #[must_use]
    pub fn peek<K: StoredObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let key = ObjectKey::of::<K>(namespace, name);
        let value = self.lock().objects.get(&key).cloned()?;
        decode(value).ok()
    }

    /// Remove an object without counting the call.
    pub fn remove<K: StoredObject>(&self, namespace: Option<&str>, name: &str) {
        let key = ObjectKey::of::<K>(namespace, name);
        self.lock().objects.remove(&key);
    }

    /// Number of stored objects of kind `K`.
    #[must_use]
    pub fn count_objects<K: StoredObject>(&self) -> usize {
        let kind = K::kind(&());
        self.lock()
            .objects
            .keys()
            .filter(|k| k.kind == kind)
            .count()
    }

    /// Number of `operation` calls made for kind `K`.
    #[must_use]
    pub fn calls<K: StoredObject>(&self, operation: Operation) -> usize {
        let kind = K::kind(&()).into_owned();
        self.lock()
            .calls
            .get(&(kind, operation))
            .copied()
            .unwrap_or_default()
    }

    /// Number of `operation` calls made across all kinds.
    #[must_use]
    pub fn total_calls(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|((_, op), _)| *op == operation)
            .map(|(_, count)| count)
            .sum()
    }

    /// Forget all recorded calls.
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every `operation` on the named object of kind `K` fail with `error`.
    pub fn fail_on<K: StoredObject>(&self, operation: Operation, name: &str, error: StoreError) {
        self.lock().failures.push(InjectedFailure {
            operation,
            kind: K::kind(&()).into_owned(),
            name: name.to_string(),
            error,
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    fn begin<K: StoredObject>(
        &self,
        name: &str,
        operation: Operation,
    ) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let kind = K::kind(&());
        let mut inner = self.lock();
        inner.record(&kind, operation);
        match inner.injected(&kind, name, operation) {
            Some(error) => Err(error),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let inner = self.begin::<K>(name, Operation::Get)?;
        let value = inner
            .objects
            .get(&ObjectKey::of::<K>(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: plural::<K>(),
                name: name.to_string(),
            })?;
        drop(inner);
        decode(value)
    }

    async fn list<K: StoredObject>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let inner = self.begin::<K>("", Operation::List)?;
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        let values: Vec<Value> = inner
            .objects
            .iter()
            .filter(|(key, _)| {
                key.api_version == api_version
                    && key.kind == kind
                    && (namespace.is_none() || key.namespace.as_deref() == namespace)
            })
            .map(|(_, value)| value.clone())
            .collect();
        drop(inner);
        values.into_iter().map(decode).collect()
    }

    async fn create<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let meta = object.meta();
        let name = meta.name.clone().unwrap_or_default();
        let key = ObjectKey::of::<K>(meta.namespace.as_deref(), &name);
        let mut value = encode(object)?;

        let mut inner = self.begin::<K>(&name, Operation::Create)?;
        if inner.objects.contains_key(&key) {
            return Err(StoreError::Conflict {
                resource: plural::<K>(),
                name,
                message: "already exists".to_string(),
            });
        }

        value["metadata"]["uid"] = Value::String(format!("uid-{}", inner.next_version + 1));
        value["metadata"]["generation"] = Value::from(1);
        inner.bump_version(&mut value);
        inner.objects.insert(key, value.clone());
        drop(inner);
        decode(value)
    }

    async fn update<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let meta = object.meta();
        let name = meta.name.clone().unwrap_or_default();
        let key = ObjectKey::of::<K>(meta.namespace.as_deref(), &name);
        let mut value = encode(object)?;

        let mut inner = self.begin::<K>(&name, Operation::Update)?;
        let Some(current) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::NotFound {
                resource: plural::<K>(),
                name,
            });
        };

        if let Some(requested) = resource_version(&value) {
            if Some(requested) != resource_version(&current) {
                return Err(StoreError::Conflict {
                    resource: plural::<K>(),
                    name,
                    message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                });
            }
        }

        if K::kind(&()) == "Job" && value["spec"]["template"] != current["spec"]["template"] {
            return Err(StoreError::Api {
                operation: "update".to_string(),
                resource: plural::<K>(),
                name: name.clone(),
                message: format!(
                    "Job.batch \"{name}\" is invalid: spec.template: Invalid value: field is immutable"
                ),
            });
        }

        value["metadata"]["uid"] = current["metadata"]["uid"].clone();
        let generation = current["metadata"]["generation"].as_i64().unwrap_or(1);
        let spec_changed = value.get("spec") != current.get("spec");
        value["metadata"]["generation"] =
            Value::from(if spec_changed { generation + 1 } else { generation });
        match current.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        inner.bump_version(&mut value);
        inner.objects.insert(key, value.clone());
        drop(inner);
        decode(value)
    }

    async fn delete<K: StoredObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.begin::<K>(name, Operation::Delete)?;
        inner
            .objects
            .remove(&ObjectKey::of::<K>(namespace, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                resource: plural::<K>(),
                name: name.to_string(),
            })
    }

    async fn update_status<K: StoredObject>(&self, object: &K) -> Result<K, StoreError> {
        let meta = object.meta();
        let name = meta.name.clone().unwrap_or_default();
        let key = ObjectKey::of::<K>(meta.namespace.as_deref(), &name);
        let status = encode(object)?.get("status").cloned().unwrap_or(Value::Null);

        let mut inner = self.begin::<K>(&name, Operation::UpdateStatus)?;
        let Some(mut current) = inner.objects.get(&key).cloned() else {
            return Err(StoreError::NotFound {
                resource: plural::<K>(),
                name,
            });
        };
        current["status"] = status;
        inner.bump_version(&mut current);
        inner.objects.insert(key, current.clone());
        drop(inner);
        decode(current)
    }
}
