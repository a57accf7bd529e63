// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Vigil - Intrusion Detection Operator for Kubernetes
//!
//! Vigil watches a single cluster-scoped `IntrusionDetection` resource and keeps
//! the intrusion detection workloads (controller, Elasticsearch index installer,
//! anomaly detection jobs and API, deep packet inspection) in line with the
//! cluster's installation, license and topology.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - The reconcile pass, the apply engine and API retries
//! - [`render`] - Pure composition of the desired workloads
//! - [`components`] - Component images and `ImageSet` digest overrides
//! - [`certificates`] - TLS key pair lookup
//! - [`status`] - Workload health tracking and degraded reporting
//! - [`store`] - Object store abstraction over the Kubernetes API
//! - [`readiness`] / [`watches`] - Dependent API readiness latches
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil::certificates::SecretCertificateManager;
//! use vigil::config::ReconcilerConfig;
//! use vigil::readiness::ReadyFlag;
//! use vigil::reconcilers::Reconciler;
//! use vigil::status::StatusRecorder;
//! use vigil::store::MemoryStore;
//!
//! # async fn example() -> Result<(), vigil::errors::ReconcileError> {
//! let store = Arc::new(MemoryStore::new());
//! let reconciler = Reconciler::new(
//!     Arc::clone(&store),
//!     Arc::new(StatusRecorder::new()),
//!     Arc::new(SecretCertificateManager::new(Arc::clone(&store))),
//!     Arc::new(ReadyFlag::new("LicenseKeyAPI")),
//!     Arc::new(ReadyFlag::new("DeepPacketInspectionAPI")),
//!     ReconcilerConfig::default(),
//! );
//! let requeue = reconciler.reconcile().await?;
//! # Ok(())
//! # }
//! ```

pub mod certificates;
pub mod components;
pub mod config;
pub mod constants;
pub mod crd;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod readiness;
pub mod reconcilers;
pub mod render;
pub mod status;
pub mod status_reasons;
pub mod store;
pub mod watches;
