// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster-backed [`StatusSink`].
//!
//! The aggregator keeps the set of tracked workloads and the current degraded
//! pair in memory. A background task calls [`StatusAggregator::refresh`] to
//! re-read rollout progress and [`StatusAggregator::publish`] to write the
//! resulting state and conditions to `IntrusionDetection/default`.
//!
//! The state lock is never held across an `.await`.

use super::conditions::{conditions_changed, update_condition_in_memory};
use super::{NamespacedName, StatusSink};
use crate::constants::{DEFAULT_INSTANCE_NAME, KIND_INTRUSION_DETECTION};
use crate::crd::{IntrusionDetection, IntrusionDetectionStatus};
use crate::errors::StoreError;
use crate::status_reasons::{
    CONDITION_TYPE_DEGRADED, CONDITION_TYPE_PROGRESSING, CONDITION_TYPE_READY, REASON_ALL_READY,
    REASON_DEGRADED, REASON_NO_WORKLOADS, REASON_PROGRESSING, STATE_DEGRADED, STATE_PROGRESSING,
    STATE_READY,
};
use crate::store::{get_optional, ObjectStore};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Workload kinds the aggregator can track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    CronJob,
}

#[derive(Debug, Default)]
struct AggregatorState {
    /// Tracked workload and whether it was available at the last refresh.
    workloads: BTreeMap<(WorkloadKind, NamespacedName), bool>,
    degraded: Option<(String, String)>,
}

impl AggregatorState {
    fn track(&mut self, kind: WorkloadKind, refs: &[NamespacedName]) {
        for r in refs {
            self.workloads.entry((kind, r.clone())).or_insert(false);
        }
    }

    fn untrack(&mut self, kind: WorkloadKind, refs: &[NamespacedName]) {
        for r in refs {
            self.workloads.remove(&(kind, r.clone()));
        }
    }

    fn available_count(&self) -> usize {
        self.workloads.values().filter(|available| **available).count()
    }
}

/// Point-in-time view of the aggregated status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSummary {
    pub state: &'static str,
    pub available: usize,
    pub total: usize,
    pub degraded: Option<(String, String)>,
}

/// Tracks workload rollout and publishes `IntrusionDetection` status.
pub struct StatusAggregator<S> {
    store: S,
    state: Mutex<AggregatorState>,
}

impl<S: ObjectStore> StatusAggregator<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(AggregatorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current state derived from tracked workloads and the degraded pair.
    #[must_use]
    pub fn summary(&self) -> StatusSummary {
        let state = self.lock();
        let total = state.workloads.len();
        let available = state.available_count();
        let label = if state.degraded.is_some() {
            STATE_DEGRADED
        } else if available < total {
            STATE_PROGRESSING
        } else {
            STATE_READY
        };
        StatusSummary {
            state: label,
            available,
            total,
            degraded: state.degraded.clone(),
        }
    }

    /// Re-read rollout progress for every tracked workload.
    ///
    /// Lookup failures other than not found keep the previous value.
    pub async fn refresh(&self) {
        let tracked: Vec<(WorkloadKind, NamespacedName)> =
            self.lock().workloads.keys().cloned().collect();

        let mut observed = Vec::with_capacity(tracked.len());
        for (kind, workload) in tracked {
            match self.workload_available(kind, &workload).await {
                Ok(available) => observed.push(((kind, workload), available)),
                Err(e) => warn!(
                    workload = %workload,
                    kind = ?kind,
                    error = %e,
                    "Failed to read workload rollout status"
                ),
            }
        }

        let mut state = self.lock();
        for (key, available) in observed {
            // Entries removed while we were reading stay removed.
            if let Some(entry) = state.workloads.get_mut(&key) {
                *entry = available;
            }
        }
    }

    async fn workload_available(
        &self,
        kind: WorkloadKind,
        workload: &NamespacedName,
    ) -> Result<bool, StoreError> {
        let ns = Some(workload.namespace.as_str());
        let name = workload.name.as_str();
        let available = match kind {
            WorkloadKind::Deployment => get_optional::<Deployment, _>(&self.store, ns, name)
                .await?
                .is_some_and(|d| deployment_available(&d)),
            WorkloadKind::DaemonSet => get_optional::<DaemonSet, _>(&self.store, ns, name)
                .await?
                .is_some_and(|d| daemonset_available(&d)),
            WorkloadKind::StatefulSet => get_optional::<StatefulSet, _>(&self.store, ns, name)
                .await?
                .is_some_and(|s| stateful_set_available(&s)),
            WorkloadKind::CronJob => get_optional::<CronJob, _>(&self.store, ns, name)
                .await?
                .is_some(),
        };
        Ok(available)
    }

    /// Write the current summary to `IntrusionDetection/default`.
    ///
    /// Nothing is written when the instance does not exist or when neither the
    /// state nor any condition changed.
    ///
    /// # Errors
    ///
    /// Returns a store error if reading or patching the instance fails.
    pub async fn publish(&self) -> Result<(), StoreError> {
        let Some(mut instance) =
            get_optional::<IntrusionDetection, _>(&self.store, None, DEFAULT_INSTANCE_NAME).await?
        else {
            debug!("IntrusionDetection {DEFAULT_INSTANCE_NAME} not found, skipping status publish");
            return Ok(());
        };

        let summary = self.summary();
        let current = instance.status.clone().unwrap_or_default();
        let mut conditions = current.conditions.clone();
        apply_summary_conditions(&mut conditions, &summary);

        let next = IntrusionDetectionStatus {
            state: Some(summary.state.to_string()),
            conditions,
            observed_generation: instance.metadata.generation,
        };

        if current.state == next.state
            && current.observed_generation == next.observed_generation
            && !conditions_changed(&current.conditions, &next.conditions)
        {
            debug!(state = %summary.state, "IntrusionDetection status unchanged");
            return Ok(());
        }

        instance.status = Some(next);
        self.store.update_status(&instance).await?;
        info!(
            state = %summary.state,
            available = summary.available,
            total = summary.total,
            "Published IntrusionDetection status"
        );
        Ok(())
    }
}

fn apply_summary_conditions(conditions: &mut Vec<crate::crd::Condition>, summary: &StatusSummary) {
    let rollout = format!("{}/{} workloads available", summary.available, summary.total);

    match &summary.degraded {
        Some((reason, message)) => {
            update_condition_in_memory(
                conditions,
                CONDITION_TYPE_DEGRADED,
                "True",
                REASON_DEGRADED,
                &format!("{reason}: {message}"),
            );
            update_condition_in_memory(
                conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_DEGRADED,
                reason,
            );
        }
        None => {
            update_condition_in_memory(
                conditions,
                CONDITION_TYPE_DEGRADED,
                "False",
                REASON_ALL_READY,
                "No degraded conditions",
            );
            let (status, reason) = if summary.total == 0 {
                ("False", REASON_NO_WORKLOADS)
            } else if summary.available < summary.total {
                ("False", REASON_PROGRESSING)
            } else {
                ("True", REASON_ALL_READY)
            };
            update_condition_in_memory(conditions, CONDITION_TYPE_READY, status, reason, &rollout);
        }
    }

    let progressing = if summary.available < summary.total {
        "True"
    } else {
        "False"
    };
    update_condition_in_memory(
        conditions,
        CONDITION_TYPE_PROGRESSING,
        progressing,
        REASON_PROGRESSING,
        &rollout,
    );
}

fn deployment_available(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let available = deployment
        .status
        .as_ref()
        .and_then(|s| s.available_replicas)
        .unwrap_or(0);
    available >= desired
}

fn daemonset_available(daemonset: &DaemonSet) -> bool {
    daemonset.status.as_ref().is_some_and(|s| {
        s.number_available.unwrap_or(0) >= s.desired_number_scheduled
    })
}

fn stateful_set_available(stateful_set: &StatefulSet) -> bool {
    let desired = stateful_set
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = stateful_set
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= desired
}

impl<S: ObjectStore> StatusSink for StatusAggregator<S> {
    fn add_deployments(&self, deployments: &[NamespacedName]) {
        self.lock().track(WorkloadKind::Deployment, deployments);
    }

    fn add_daemonsets(&self, daemonsets: &[NamespacedName]) {
        self.lock().track(WorkloadKind::DaemonSet, daemonsets);
    }

    fn add_stateful_sets(&self, stateful_sets: &[NamespacedName]) {
        self.lock().track(WorkloadKind::StatefulSet, stateful_sets);
    }

    fn add_cron_jobs(&self, cron_jobs: &[NamespacedName]) {
        self.lock().track(WorkloadKind::CronJob, cron_jobs);
    }

    fn remove_deployments(&self, deployments: &[NamespacedName]) {
        self.lock().untrack(WorkloadKind::Deployment, deployments);
    }

    fn remove_daemonsets(&self, daemonsets: &[NamespacedName]) {
        self.lock().untrack(WorkloadKind::DaemonSet, daemonsets);
    }

    fn set_degraded(&self, reason: &str, message: &str) {
        let next = (reason.to_string(), message.to_string());
        let mut state = self.lock();
        if state.degraded.as_ref() != Some(&next) {
            warn!(reason = %reason, message = %message, "Intrusion detection degraded");
            crate::metrics::record_degraded(KIND_INTRUSION_DETECTION, reason);
        }
        state.degraded = Some(next);
    }

    fn clear_degraded(&self) {
        let mut state = self.lock();
        if let Some((reason, _)) = state.degraded.take() {
            info!(previous_reason = %reason, "Intrusion detection no longer degraded");
            crate::metrics::record_degraded_cleared(KIND_INTRUSION_DETECTION);
        }
    }

    fn is_available(&self) -> bool {
        self.lock().workloads.values().all(|available| *available)
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod aggregator_tests;
