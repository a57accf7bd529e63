// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for intrusion detection enablement.
//!
//! This module defines the Kubernetes Custom Resource Definitions the operator
//! owns or reads while enabling intrusion detection.
//!
//! # Resource Types
//!
//! ## Owned
//!
//! - [`IntrusionDetection`] - Declares that intrusion detection should run in this cluster
//!
//! ## Read
//!
//! - [`Installation`] - Product variant, registry and pull secrets
//! - [`ImageSet`] - Digest overrides for a release's images
//! - [`LicenseKey`] - Licensed feature set
//! - [`APIServer`] - Aggregated API server health
//! - [`ManagementCluster`] / [`ManagementClusterConnection`] - Topology markers
//! - [`DeepPacketInspection`] - Namespaced DPI selectors
//!
//! # Example: Enabling intrusion detection
//!
//! ```rust,no_run
//! use vigil::crd::{IntrusionDetection, IntrusionDetectionSpec};
//!
//! let ids = IntrusionDetection::new("default", IntrusionDetectionSpec::default());
//! assert!(ids.spec.component_resources.is_none());
//! ```

use k8s_openapi::api::core::v1::{LocalObjectReference, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. One of: Ready, Progressing, Degraded.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// IntrusionDetection
// ============================================================================

/// Component whose resource requirements can be customised.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ComponentName {
    /// The deep packet inspection daemon set.
    DeepPacketInspection,
}

/// Resource requirements for a single named component.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntrusionDetectionComponentResource {
    /// Component the requirements apply to.
    pub component_name: ComponentName,

    /// CPU and memory requests and limits for the component's containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirements>,
}

/// `IntrusionDetection` enables threat detection workloads cluster-wide.
///
/// The operator only reconciles the instance named `default`.
///
/// # Example
///
/// ```yaml
/// apiVersion: operator.vigil.io/v1
/// kind: IntrusionDetection
/// metadata:
///   name: default
/// spec:
///   componentResources:
///     - componentName: DeepPacketInspection
///       resourceRequirements:
///         requests:
///           cpu: 100m
///           memory: 100Mi
///         limits:
///           cpu: "1"
///           memory: 1Gi
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "IntrusionDetection",
    doc = "IntrusionDetection installs the components required for threat detection and anomaly detection."
)]
#[kube(status = "IntrusionDetectionStatus")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[serde(rename_all = "camelCase")]
pub struct IntrusionDetectionSpec {
    /// Per-component resource requirements. Missing entries are filled with
    /// defaults and written back by the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_resources: Option<Vec<IntrusionDetectionComponentResource>>,
}

impl IntrusionDetectionSpec {
    /// Resource requirements declared for `component`, if any.
    #[must_use]
    pub fn resource_requirements_for(
        &self,
        component: ComponentName,
    ) -> Option<&ResourceRequirements> {
        self.component_resources
            .as_deref()?
            .iter()
            .find(|c| c.component_name == component)
            .and_then(|c| c.resource_requirements.as_ref())
    }
}

/// `IntrusionDetection` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntrusionDetectionStatus {
    /// Aggregate state: Ready, Progressing or Degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// ============================================================================
// Installation
// ============================================================================

/// Product variant of the installation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ProductVariant {
    /// Open source networking only.
    Community,
    /// Commercial edition with intrusion detection.
    Enterprise,
}

/// `Installation` configures the product installation shared by every component.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "Installation",
    doc = "Installation configures the product variant, image registry and pull secrets for all components."
)]
#[kube(status = "InstallationStatus")]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Declared product variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<ProductVariant>,

    /// Registry prefix for all images, e.g. `my.registry.io/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Replaces the leading path of every image name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Secrets in the operator namespace used to pull images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,
}

/// `Installation` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Variant that is actually installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<ProductVariant>,

    /// Fully defaulted configuration computed by the installation controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<InstallationSpec>,
}

// ============================================================================
// ImageSet
// ============================================================================

/// A single digest override.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigest {
    /// Canonical image name without registry or tag, e.g. `vigil/deep-packet-inspection`.
    pub image: String,
    /// Image digest, e.g. `sha256:...`.
    pub digest: String,
}

/// `ImageSet` pins the images of one release to digests.
///
/// It must be named `enterprise-<release>` to take effect.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "ImageSet",
    doc = "ImageSet overrides the images of a release with digest-pinned references."
)]
#[serde(rename_all = "camelCase")]
pub struct ImageSetSpec {
    #[serde(default)]
    pub images: Vec<ImageDigest>,
}

// ============================================================================
// LicenseKey
// ============================================================================

/// `LicenseKey` carries the cluster's license token.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "LicenseKey",
    doc = "LicenseKey holds the license token; its status lists the licensed features."
)]
#[kube(status = "LicenseKeyStatus")]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeySpec {
    /// Signed license token.
    #[serde(default)]
    pub token: String,
}

/// `LicenseKey` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeyStatus {
    /// Expiry of the license (RFC3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,

    /// Features unlocked by the license.
    #[serde(default)]
    pub features: Vec<String>,
}

impl LicenseKey {
    /// Whether the license's status lists `feature`.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.features.iter().any(|f| f == feature))
    }
}

// ============================================================================
// APIServer
// ============================================================================

/// `APIServer` installs the aggregated API server.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "APIServer",
    doc = "APIServer installs the aggregated API server that serves the licensing and threat APIs."
)]
#[kube(status = "APIServerStatus")]
#[serde(rename_all = "camelCase")]
pub struct APIServerSpec {}

/// `APIServer` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServerStatus {
    /// `Ready` once the API server is serving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

// ============================================================================
// Topology markers
// ============================================================================

/// `ManagementCluster` marks this cluster as a hub for managed clusters.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "ManagementCluster",
    doc = "ManagementCluster marks this cluster as a management cluster."
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterSpec {
    /// Address managed clusters connect to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// `ManagementClusterConnection` marks this cluster as managed by a hub.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "ManagementClusterConnection",
    doc = "ManagementClusterConnection connects this cluster to a management cluster."
)]
#[serde(rename_all = "camelCase")]
pub struct ManagementClusterConnectionSpec {
    /// Address of the management cluster tunnel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_cluster_addr: Option<String>,
}

// ============================================================================
// DeepPacketInspection
// ============================================================================

/// `DeepPacketInspection` selects endpoints for packet inspection.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.vigil.io",
    version = "v1",
    kind = "DeepPacketInspection",
    namespaced,
    doc = "DeepPacketInspection selects workload endpoints whose traffic is inspected for threats."
)]
#[serde(rename_all = "camelCase")]
pub struct DeepPacketInspectionSpec {
    /// Endpoint selector expression, e.g. `k8s-app == "frontend"`.
    #[serde(default)]
    pub selector: String,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
