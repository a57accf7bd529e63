// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One-way readiness latches for dependent APIs.
//!
//! A [`ReadyFlag`] starts unready and is flipped exactly once by a background
//! watch (see [`crate::watches`]). The reconciler reads it without locking: a
//! stale "not ready" only defers a pass, it never causes an incorrect write.

use std::sync::atomic::{AtomicBool, Ordering};

/// Monotonic latch: never-ready → ready, never reset.
#[derive(Debug, Default)]
pub struct ReadyFlag {
    name: &'static str,
    ready: AtomicBool,
}

impl ReadyFlag {
    /// Create an unready flag for the API family `name` (e.g. `LicenseKeyAPI`).
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            ready: AtomicBool::new(false),
        }
    }

    /// Name of the API family this flag gates.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Latch the flag. Idempotent.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod readiness_tests;
