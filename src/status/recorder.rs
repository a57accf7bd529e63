// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`StatusSink`] that remembers every call.

use super::{NamespacedName, StatusSink};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

/// One `set_degraded` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DegradedReport {
    pub reason: String,
    pub message: String,
}

#[derive(Debug)]
struct RecorderState {
    deployments: BTreeSet<NamespacedName>,
    daemonsets: BTreeSet<NamespacedName>,
    stateful_sets: BTreeSet<NamespacedName>,
    cron_jobs: BTreeSet<NamespacedName>,
    degraded_calls: Vec<DegradedReport>,
    current: Option<DegradedReport>,
    clear_calls: usize,
    available: bool,
}

/// Records sink calls for assertions.
///
/// Availability is fixed by the caller through [`StatusRecorder::set_available`]
/// and defaults to `true`.
#[derive(Debug)]
pub struct StatusRecorder {
    state: Mutex<RecorderState>,
}

impl Default for StatusRecorder {
    fn default() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                deployments: BTreeSet::new(),
                daemonsets: BTreeSet::new(),
                stateful_sets: BTreeSet::new(),
                cron_jobs: BTreeSet::new(),
                degraded_calls: Vec::new(),
                current: None,
                clear_calls: 0,
                available: true,
            }),
        }
    }
}

impl StatusRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Every `set_degraded` call, in order.
    #[must_use]
    pub fn degraded_calls(&self) -> Vec<DegradedReport> {
        self.lock().degraded_calls.clone()
    }

    /// The degraded pair currently in effect.
    #[must_use]
    pub fn current_degraded(&self) -> Option<DegradedReport> {
        self.lock().current.clone()
    }

    #[must_use]
    pub fn clear_calls(&self) -> usize {
        self.lock().clear_calls
    }

    #[must_use]
    pub fn deployments(&self) -> Vec<NamespacedName> {
        self.lock().deployments.iter().cloned().collect()
    }

    #[must_use]
    pub fn daemonsets(&self) -> Vec<NamespacedName> {
        self.lock().daemonsets.iter().cloned().collect()
    }

    #[must_use]
    pub fn stateful_sets(&self) -> Vec<NamespacedName> {
        self.lock().stateful_sets.iter().cloned().collect()
    }

    #[must_use]
    pub fn cron_jobs(&self) -> Vec<NamespacedName> {
        self.lock().cron_jobs.iter().cloned().collect()
    }

    /// Forget all recorded calls, keeping availability.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.degraded_calls.clear();
        state.clear_calls = 0;
    }
}

impl StatusSink for StatusRecorder {
    fn add_deployments(&self, deployments: &[NamespacedName]) {
        self.lock().deployments.extend(deployments.iter().cloned());
    }

    fn add_daemonsets(&self, daemonsets: &[NamespacedName]) {
        self.lock().daemonsets.extend(daemonsets.iter().cloned());
    }

    fn add_stateful_sets(&self, stateful_sets: &[NamespacedName]) {
        self.lock().stateful_sets.extend(stateful_sets.iter().cloned());
    }

    fn add_cron_jobs(&self, cron_jobs: &[NamespacedName]) {
        self.lock().cron_jobs.extend(cron_jobs.iter().cloned());
    }

    fn remove_deployments(&self, deployments: &[NamespacedName]) {
        let mut state = self.lock();
        for deployment in deployments {
            state.deployments.remove(deployment);
        }
    }

    fn remove_daemonsets(&self, daemonsets: &[NamespacedName]) {
        let mut state = self.lock();
        for daemonset in daemonsets {
            state.daemonsets.remove(daemonset);
        }
    }

    fn set_degraded(&self, reason: &str, message: &str) {
        let report = DegradedReport {
            reason: reason.to_string(),
            message: message.to_string(),
        };
        let mut state = self.lock();
        state.degraded_calls.push(report.clone());
        state.current = Some(report);
    }

    fn clear_degraded(&self) {
        let mut state = self.lock();
        state.clear_calls += 1;
        state.current = None;
    }

    fn is_available(&self) -> bool {
        self.lock().available
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod recorder_tests;
