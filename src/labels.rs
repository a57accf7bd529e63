// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all rendered workloads.
//!
//! This module defines standard Kubernetes labels and Vigil-specific labels
//! to ensure consistency across all resources created by the operator.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_VIGIL: &str = "vigil";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_INTRUSION_DETECTION: &str = "IntrusionDetection";

/// Component value for the intrusion detection controller
pub const COMPONENT_CONTROLLER: &str = "intrusion-detection-controller";

/// Component value for the Elasticsearch job installer
pub const COMPONENT_INSTALLER: &str = "intrusion-detection-installer";

/// Component value for anomaly detection jobs
pub const COMPONENT_AD_JOBS: &str = "anomaly-detection-jobs";

/// Component value for the anomaly detection API
pub const COMPONENT_AD_API: &str = "anomaly-detection-api";

/// Component value for deep packet inspection
pub const COMPONENT_DPI: &str = "deep-packet-inspection";

/// Component value for secrets copied out of the operator namespace
pub const COMPONENT_CREDENTIALS: &str = "credentials";

// ============================================================================
// Vigil-Specific Labels
// ============================================================================

/// Selector label shared by a workload and its pods
pub const VIGIL_APP_LABEL: &str = "k8s-app";

/// Label on anomaly detection pod templates naming the job cycle
pub const VIGIL_AD_CYCLE_LABEL: &str = "operator.vigil.io/ad-cycle";
