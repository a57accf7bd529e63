// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation for intrusion detection.
//!
//! # Reconciliation Architecture
//!
//! Vigil follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Any change to `IntrusionDetection`, its inputs or its
//!    workloads queues the `default` instance
//! 2. **Reconcile** - Resolve every input and render the desired objects
//! 3. **Update** - Create, update or delete objects until the cluster matches
//! 4. **Status** - Report degraded reasons and workload health
//!
//! # Modules
//!
//! - [`intrusiondetection`] - The reconcile pass ([`Reconciler`])
//! - [`apply`] - Idempotent create-or-update and obsolete cleanup
//! - [`retry`] - Exponential backoff for API calls and failed passes

pub mod apply;
pub mod intrusiondetection;
pub mod retry;

pub use intrusiondetection::Reconciler;
