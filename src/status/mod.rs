// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health reporting for the intrusion detection workloads.
//!
//! The reconciler registers the workloads it rolls out and reports at most one
//! degraded `(reason, message)` pair through [`StatusSink`]. Implementations:
//!
//! - [`StatusAggregator`] - tracks rollout against the cluster and publishes
//!   `IntrusionDetection.status`
//! - [`StatusRecorder`] - in-memory, counts every call (used by tests)

use std::fmt;

pub mod aggregator;
pub mod conditions;
pub mod recorder;

pub use aggregator::StatusAggregator;
pub use recorder::{DegradedReport, StatusRecorder};

/// Reference to a namespaced workload.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Sink for workload registration and degraded reporting.
///
/// Calls are synchronous and cheap; implementations must not block on the
/// cluster.
pub trait StatusSink: Send + Sync {
    fn add_deployments(&self, deployments: &[NamespacedName]);

    fn add_daemonsets(&self, daemonsets: &[NamespacedName]);

    fn add_stateful_sets(&self, stateful_sets: &[NamespacedName]);

    fn add_cron_jobs(&self, cron_jobs: &[NamespacedName]);

    /// Stop tracking deployments that are no longer desired.
    fn remove_deployments(&self, deployments: &[NamespacedName]);

    /// Stop tracking daemon sets that are no longer desired.
    fn remove_daemonsets(&self, daemonsets: &[NamespacedName]);

    /// Report the single current degraded pair, replacing any previous one.
    fn set_degraded(&self, reason: &str, message: &str);

    fn clear_degraded(&self);

    /// Whether every tracked workload has rolled out.
    fn is_available(&self) -> bool;
}
