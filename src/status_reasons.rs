// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types and degraded reasons for the `IntrusionDetection` resource.
//!
//! Degraded reports are `(reason, message)` pairs. The reason is a short,
//! human-readable summary shown to operators; the message carries the detail
//! (usually the underlying error text).
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   state: Degraded
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: Degraded
//!       message: "Feature is not active: License does not support this feature"
//!     - type: Degraded
//!       status: "True"
//!       reason: Degraded
//!       message: "Feature is not active: License does not support this feature"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Workloads are rolling out
pub const CONDITION_TYPE_PROGRESSING: &str = "Progressing";

/// A precondition or apply step failed
pub const CONDITION_TYPE_DEGRADED: &str = "Degraded";

// ============================================================================
// Condition Reasons (CamelCase)
// ============================================================================

/// All tracked workloads are available.
pub const REASON_ALL_READY: &str = "AllReady";

/// Some tracked workloads are not yet available.
pub const REASON_PROGRESSING: &str = "Progressing";

/// The last reconcile pass reported a degraded pair.
pub const REASON_DEGRADED: &str = "Degraded";

/// Nothing is tracked yet.
pub const REASON_NO_WORKLOADS: &str = "NoWorkloads";

// ============================================================================
// Aggregate State Values
// ============================================================================

/// `status.state` once every tracked workload is available
pub const STATE_READY: &str = "Ready";

/// `status.state` while workloads roll out
pub const STATE_PROGRESSING: &str = "Progressing";

/// `status.state` while a degraded pair is set
pub const STATE_DEGRADED: &str = "Degraded";

// ============================================================================
// Degraded Reasons
// ============================================================================

/// The license does not include the threat defense feature.
pub const DEGRADED_FEATURE_NOT_ACTIVE: &str = "Feature is not active";

/// Message paired with [`DEGRADED_FEATURE_NOT_ACTIVE`].
pub const DEGRADED_FEATURE_NOT_ACTIVE_MESSAGE: &str = "License does not support this feature";

/// Dependent Elasticsearch access secrets are missing.
pub const DEGRADED_ES_SECRETS_UNAVAILABLE: &str =
    "Elasticsearch secrets are not available yet, waiting until they become available";

/// The installation is not in a state intrusion detection can use.
pub const DEGRADED_INSTALLATION: &str = "Error querying installation";

/// The installation is not the enterprise variant (yet).
pub const DEGRADED_INSTALLATION_VARIANT: &str = "Waiting for enterprise installation";

/// The license key could not be read.
pub const DEGRADED_LICENSE: &str = "License not found";

/// The `ImageSet` for this release is invalid.
pub const DEGRADED_IMAGE_SET: &str = "Error validating ImageSet";

/// An image reference could not be resolved.
pub const DEGRADED_IMAGE_RESOLUTION: &str = "Error resolving image references";

/// The aggregated API server is not ready.
pub const DEGRADED_API_SERVER: &str = "Waiting for Vigil API server to be ready";

/// Both topology markers are present.
pub const DEGRADED_TOPOLOGY: &str = "Invalid cluster topology";

/// A pull secret listed on the installation is missing.
pub const DEGRADED_PULL_SECRETS: &str = "Error retrieving pull secrets";

/// Elasticsearch cluster configuration or certificate is missing.
pub const DEGRADED_ES_CONFIG: &str = "Failed to get Elasticsearch configuration";

/// A TLS key pair is missing or malformed.
pub const DEGRADED_KEY_PAIR: &str = "Error creating TLS certificate";

/// `DeepPacketInspection` resources could not be listed.
pub const DEGRADED_DPI_LIST: &str = "Failed to list DeepPacketInspection resources";

/// Writing computed defaults back to the custom resource failed.
pub const DEGRADED_DEFAULTS: &str = "Failed to write defaults";

/// A desired object could not be created, updated or removed.
pub const DEGRADED_APPLY: &str = "Error creating / updating resource";

/// Reading a dependency failed for a reason other than absence.
pub const DEGRADED_STORE: &str = "Error querying cluster state";

/// Build the "waiting for API" degraded reason for a readiness flag.
#[must_use]
pub fn waiting_for_api(api_name: &str) -> String {
    format!("Waiting for {api_name} to be ready")
}

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
