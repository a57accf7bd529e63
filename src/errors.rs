// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the intrusion detection reconciler.
//!
//! This module provides structured errors for:
//! - Cluster object store operations (not found, conflicts, API failures)
//! - Image reference resolution and `ImageSet` validation
//! - TLS key pair lookup
//! - Precondition resolution (each variant maps to a degraded reason)
//! - Whole reconcile passes
//!
//! Display strings double as degraded messages, so they read the way
//! `kubectl` users expect (e.g. `secrets "x" not found`).

use crate::status_reasons::{
    DEGRADED_APPLY, DEGRADED_DEFAULTS, DEGRADED_DPI_LIST, DEGRADED_ES_CONFIG,
    DEGRADED_IMAGE_RESOLUTION, DEGRADED_IMAGE_SET, DEGRADED_INSTALLATION, DEGRADED_KEY_PAIR,
    DEGRADED_LICENSE, DEGRADED_PULL_SECRETS, DEGRADED_STORE, DEGRADED_TOPOLOGY,
};
use thiserror::Error;

/// Errors returned by an [`crate::store::ObjectStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    ///
    /// `resource` is the plural resource name (e.g. `secrets`).
    #[error("{resource} \"{name}\" not found")]
    NotFound {
        /// Plural resource name
        resource: String,
        /// Object name
        name: String,
    },

    /// Optimistic concurrency failure: the object already exists or its
    /// `resourceVersion` is stale.
    #[error("operation cannot be fulfilled on {resource} \"{name}\": {message}")]
    Conflict {
        /// Plural resource name
        resource: String,
        /// Object name
        name: String,
        /// Detail from the store
        message: String,
    },

    /// Any other API or serialization failure.
    #[error("{operation} {resource} \"{name}\" failed: {message}")]
    Api {
        /// Verb that failed (get, list, create, ...)
        operation: String,
        /// Plural resource name
        resource: String,
        /// Object name, empty for list calls
        name: String,
        /// Detail from the store
        message: String,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors resolving container image references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Neither a default version nor an override exists for the image.
    #[error("no version or digest available for image {image}")]
    Unresolvable {
        /// Canonical image name
        image: String,
    },

    /// The `ImageSet` for this release is malformed.
    #[error("ImageSet {name} is invalid: {reason}")]
    InvalidImageSet {
        /// `ImageSet` name
        name: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors locating TLS key pairs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// The key pair secret has not been provisioned.
    #[error("key pair secret {namespace}/{secret} has not been provisioned")]
    NotProvisioned {
        /// Secret name
        secret: String,
        /// Secret namespace
        namespace: String,
    },

    /// The secret exists but does not hold a usable key pair.
    #[error("key pair secret {namespace}/{secret} is malformed: {reason}")]
    Malformed {
        /// Secret name
        secret: String,
        /// Secret namespace
        namespace: String,
        /// What is missing or invalid
        reason: String,
    },

    /// Reading the secret failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal precondition failures.
///
/// Each variant is surfaced as a degraded `(reason, message)` pair via
/// [`PreconditionError::degraded_reason`] and `to_string()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// The `Installation` resource does not exist.
    #[error("Installation {name} not found")]
    InstallationNotFound {
        /// Expected installation name
        name: String,
    },

    /// A pull secret referenced by the installation is missing.
    #[error("pull secrets not found in namespace {namespace}: {}", missing.join(", "))]
    PullSecretsMissing {
        /// Operator namespace
        namespace: String,
        /// Missing secret names
        missing: Vec<String>,
    },

    /// `ImageSet` validation or image resolution failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Both `ManagementCluster` and `ManagementClusterConnection` exist.
    #[error("a cluster cannot be both a management cluster and a managed cluster")]
    ConflictingTopology,

    /// Elasticsearch configuration is missing or incomplete.
    #[error("{0}")]
    ElasticsearchConfig(String),

    /// A TLS key pair is missing or malformed.
    #[error(transparent)]
    KeyPair(#[from] CertificateError),

    /// Listing `DeepPacketInspection` resources failed.
    #[error("failed to list DeepPacketInspection resources: {0}")]
    DpiList(StoreError),

    /// Reading the license failed for a reason other than absence.
    #[error("failed to read LicenseKey: {0}")]
    License(StoreError),

    /// Any other store failure while reading a dependency.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PreconditionError {
    /// Degraded reason to report for this failure.
    #[must_use]
    pub fn degraded_reason(&self) -> &'static str {
        match self {
            Self::InstallationNotFound { .. } => DEGRADED_INSTALLATION,
            Self::PullSecretsMissing { .. } => DEGRADED_PULL_SECRETS,
            Self::Image(ImageError::InvalidImageSet { .. }) => DEGRADED_IMAGE_SET,
            Self::Image(ImageError::Unresolvable { .. }) => DEGRADED_IMAGE_RESOLUTION,
            Self::ConflictingTopology => DEGRADED_TOPOLOGY,
            Self::ElasticsearchConfig(_) => DEGRADED_ES_CONFIG,
            Self::KeyPair(_) => DEGRADED_KEY_PAIR,
            Self::DpiList(_) => DEGRADED_DPI_LIST,
            Self::License(_) => DEGRADED_LICENSE,
            Self::Store(_) => DEGRADED_STORE,
        }
    }
}

/// Errors returned from a reconcile pass.
///
/// Returning one of these engages the controller's error backoff.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A required input is missing or invalid.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Computed defaults could not be written back.
    #[error("failed to write defaults to IntrusionDetection: {0}")]
    Defaults(StoreError),

    /// One or more desired objects could not be applied.
    #[error("{failed} of {attempted} objects failed to apply; first failure: {first}")]
    Apply {
        /// Objects that failed
        failed: usize,
        /// Objects attempted (desired plus obsolete)
        attempted: usize,
        /// First failure message
        first: String,
    },

    /// Reading the owned resource failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Degraded reason to report for this failure.
    #[must_use]
    pub fn degraded_reason(&self) -> &'static str {
        match self {
            Self::Precondition(e) => e.degraded_reason(),
            Self::Defaults(_) => DEGRADED_DEFAULTS,
            Self::Apply { .. } => DEGRADED_APPLY,
            Self::Store(_) => DEGRADED_STORE,
        }
    }

    /// Short label used for the `error_type` metric.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::Defaults(_) => "defaults",
            Self::Apply { .. } => "apply",
            Self::Store(_) => "store",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
