// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Idempotent create-or-update of desired objects.
//!
//! Every desired object goes through the same explicit diff:
//!
//! 1. `get` the live object
//! 2. absent: `create`; a `Conflict` means someone else created it first, so
//!    re-`get` and carry on as if it had been present
//! 3. present: when every field the desired object sets already has the same
//!    value on the live object the call is a no-op, otherwise `update` with the
//!    live `resourceVersion`, keeping live labels and annotations the operator
//!    does not set
//!
//! A `Job`'s pod template cannot be changed once created, so a drifted `Job`
//! is deleted and created again instead of updated (see [`DriftPolicy`]).
//!
//! Failures are isolated per object and collected in an [`ApplyReport`], then
//! obsolete objects are deleted (absence counts as success).
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil::reconcilers::apply::apply_object_set;
//! use vigil::render::compose_teardown;
//! use vigil::store::MemoryStore;
//!
//! # async fn example() {
//! let store = MemoryStore::new();
//! let report = apply_object_set(&store, &compose_teardown()).await;
//! assert!(report.is_success());
//! # }
//! ```

use crate::errors::{ReconcileError, StoreError};
use crate::metrics::{
    record_resource_created, record_resource_deleted, record_resource_unchanged,
    record_resource_updated,
};
use crate::render::{DesiredObject, DesiredObjectSet, ObjectKind, ObjectRef};
use crate::store::{get_optional, plural, ObjectStore, StoredObject};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PodTemplate, Secret};
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What [`create_or_update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    /// Deleted and created again
    Recreated,
    Unchanged,
}

/// How a live object that differs from the desired one is brought in line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftPolicy {
    /// `update` in place
    Update,
    /// `delete` then `create`, for kinds with immutable pod templates
    Recreate,
}

/// A desired or obsolete object that could not be reconciled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyFailure {
    pub object: ObjectRef,
    pub error: StoreError,
}

/// Per-object results of one apply pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: Vec<ObjectRef>,
    pub updated: Vec<ObjectRef>,
    pub unchanged: Vec<ObjectRef>,
    pub deleted: Vec<ObjectRef>,
    pub failures: Vec<ApplyFailure>,
    /// Desired plus obsolete objects looked at
    pub attempted: usize,
}

impl ApplyReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn first_failure(&self) -> Option<&ApplyFailure> {
        self.failures.first()
    }

    /// Error describing the failures, if there were any.
    #[must_use]
    pub fn to_error(&self) -> Option<ReconcileError> {
        self.first_failure().map(|first| ReconcileError::Apply {
            failed: self.failures.len(),
            attempted: self.attempted,
            first: first.error.to_string(),
        })
    }
}

/// Whether every field set in `desired` has the same value in `live`.
///
/// Objects are compared key by key, arrays element by element (same length),
/// scalars by equality. Fields only present on `live` (defaults, status,
/// server metadata) are ignored.
#[must_use]
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| have.get(key).is_some_and(|live| is_subset(value, live))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| is_subset(w, h))
        }
        _ => desired == live,
    }
}

fn encode_error<K: StoredObject>(name: &str, err: &serde_json::Error) -> StoreError {
    StoreError::Api {
        operation: "encode".to_string(),
        resource: plural::<K>(),
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn merged(
    live: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (live, desired) {
        (None, None) => None,
        _ => {
            let mut out = live.cloned().unwrap_or_default();
            out.extend(desired.cloned().unwrap_or_default());
            Some(out)
        }
    }
}

/// Create `desired` or update the live object in place.
///
/// # Errors
///
/// Returns the store error of the failing call.
pub async fn create_or_update<K, S>(store: &S, desired: &K) -> Result<ApplyOutcome, StoreError>
where
    K: StoredObject,
    S: ObjectStore,
{
    reconcile_object(store, desired, DriftPolicy::Update).await
}

/// Create `desired`, or delete and recreate the live object when it differs.
///
/// # Errors
///
/// Returns the store error of the failing call.
pub async fn create_or_recreate<K, S>(store: &S, desired: &K) -> Result<ApplyOutcome, StoreError>
where
    K: StoredObject,
    S: ObjectStore,
{
    reconcile_object(store, desired, DriftPolicy::Recreate).await
}

async fn reconcile_object<K, S>(
    store: &S,
    desired: &K,
    policy: DriftPolicy,
) -> Result<ApplyOutcome, StoreError>
where
    K: StoredObject,
    S: ObjectStore,
{
    let name = desired.name_any();
    let namespace = desired.namespace();
    let ns = namespace.as_deref();

    debug!(
        namespace = ?ns,
        name = %name,
        kind = %K::kind(&()),
        "Creating or updating resource"
    );

    let live = match get_optional::<K, _>(store, ns, &name).await? {
        Some(live) => live,
        None => match store.create(desired).await {
            Ok(_) => {
                info!("Created {} {}/{}", K::kind(&()), ns.unwrap_or_default(), name);
                return Ok(ApplyOutcome::Created);
            }
            Err(e) if e.is_conflict() => {
                debug!(
                    "{} {}/{} was created concurrently, comparing with live object",
                    K::kind(&()),
                    ns.unwrap_or_default(),
                    name
                );
                store.get::<K>(ns, &name).await?
            }
            Err(e) => return Err(e),
        },
    };

    let desired_value = serde_json::to_value(desired).map_err(|e| encode_error::<K>(&name, &e))?;
    let live_value = serde_json::to_value(&live).map_err(|e| encode_error::<K>(&name, &e))?;
    if is_subset(&desired_value, &live_value) {
        debug!("{} {}/{} is up to date", K::kind(&()), ns.unwrap_or_default(), name);
        return Ok(ApplyOutcome::Unchanged);
    }

    if policy == DriftPolicy::Recreate {
        delete_if_exists::<K, _>(store, ns, &name).await?;
        store.create(desired).await?;
        info!("Recreated {} {}/{}", K::kind(&()), ns.unwrap_or_default(), name);
        return Ok(ApplyOutcome::Recreated);
    }

    let mut update = desired.clone();
    {
        let meta = update.meta_mut();
        meta.resource_version = live.meta().resource_version.clone();
        meta.labels = merged(live.meta().labels.as_ref(), desired.meta().labels.as_ref());
        meta.annotations = merged(
            live.meta().annotations.as_ref(),
            desired.meta().annotations.as_ref(),
        );
    }
    store.update(&update).await?;
    info!("Updated {} {}/{}", K::kind(&()), ns.unwrap_or_default(), name);
    Ok(ApplyOutcome::Updated)
}

/// Delete an object, treating absence as success.
///
/// Returns whether anything was deleted.
///
/// # Errors
///
/// Returns any store error other than not found.
pub async fn delete_if_exists<K, S>(
    store: &S,
    namespace: Option<&str>,
    name: &str,
) -> Result<bool, StoreError>
where
    K: StoredObject,
    S: ObjectStore,
{
    match store.delete::<K>(namespace, name).await {
        Ok(()) => {
            info!("Deleted {} {}/{}", K::kind(&()), namespace.unwrap_or_default(), name);
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

async fn apply_desired<S: ObjectStore>(
    store: &S,
    object: &DesiredObject,
) -> Result<ApplyOutcome, StoreError> {
    match object {
        DesiredObject::Secret(o) => create_or_update(store, o).await,
        DesiredObject::Deployment(o) => create_or_update(store, o).await,
        DesiredObject::Job(o) => create_or_recreate(store, o).await,
        DesiredObject::PodTemplate(o) => create_or_update(store, o).await,
        DesiredObject::DaemonSet(o) => create_or_update(store, o).await,
    }
}

async fn delete_obsolete<S: ObjectStore>(
    store: &S,
    object: &ObjectRef,
) -> Result<bool, StoreError> {
    let ns = Some(object.namespace.as_str());
    match object.kind {
        ObjectKind::Secret => delete_if_exists::<Secret, _>(store, ns, &object.name).await,
        ObjectKind::Deployment => delete_if_exists::<Deployment, _>(store, ns, &object.name).await,
        ObjectKind::Job => delete_if_exists::<Job, _>(store, ns, &object.name).await,
        ObjectKind::PodTemplate => {
            delete_if_exists::<PodTemplate, _>(store, ns, &object.name).await
        }
        ObjectKind::DaemonSet => delete_if_exists::<DaemonSet, _>(store, ns, &object.name).await,
    }
}

/// Apply every desired object, then remove every obsolete one.
///
/// Never stops early: a failing object is recorded and the rest still run.
pub async fn apply_object_set<S: ObjectStore>(store: &S, set: &DesiredObjectSet) -> ApplyReport {
    let mut report = ApplyReport::default();

    for object in &set.objects {
        let object_ref = object.object_ref();
        let kind = object_ref.kind.to_string();
        report.attempted += 1;
        match apply_desired(store, object).await {
            Ok(ApplyOutcome::Created) => {
                record_resource_created(&kind);
                report.created.push(object_ref);
            }
            Ok(ApplyOutcome::Updated | ApplyOutcome::Recreated) => {
                record_resource_updated(&kind);
                report.updated.push(object_ref);
            }
            Ok(ApplyOutcome::Unchanged) => {
                record_resource_unchanged(&kind);
                report.unchanged.push(object_ref);
            }
            Err(error) => {
                warn!(object = %object_ref, error = %error, "Failed to apply object");
                report.failures.push(ApplyFailure {
                    object: object_ref,
                    error,
                });
            }
        }
    }

    for object_ref in &set.obsolete {
        report.attempted += 1;
        match delete_obsolete(store, object_ref).await {
            Ok(true) => {
                record_resource_deleted(&object_ref.kind.to_string());
                report.deleted.push(object_ref.clone());
            }
            Ok(false) => {}
            Err(error) => {
                warn!(object = %object_ref, error = %error, "Failed to delete obsolete object");
                report.failures.push(ApplyFailure {
                    object: object_ref.clone(),
                    error,
                });
            }
        }
    }

    debug!(
        created = report.created.len(),
        updated = report.updated.len(),
        unchanged = report.unchanged.len(),
        deleted = report.deleted.len(),
        failed = report.failures.len(),
        "Apply pass finished"
    );
    report
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
