// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Vigil operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Vigil operator CRDs
pub const API_GROUP: &str = "operator.vigil.io";

/// API version for all Vigil operator CRDs
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "operator.vigil.io/v1";

/// Kind name for `IntrusionDetection` resource
pub const KIND_INTRUSION_DETECTION: &str = "IntrusionDetection";

/// Kind name for `LicenseKey` resource
pub const KIND_LICENSE_KEY: &str = "LicenseKey";

/// Kind name for `DeepPacketInspection` resource
pub const KIND_DEEP_PACKET_INSPECTION: &str = "DeepPacketInspection";

// ============================================================================
// Well-Known Resource Names
// ============================================================================

/// Name of the singleton `Installation`, `IntrusionDetection` and `LicenseKey`
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Name of the singleton `APIServer`, `ManagementCluster` and `ManagementClusterConnection`
pub const SECURE_INSTANCE_NAME: &str = "vigil-secure";

/// Release tag every component image defaults to
pub const RELEASE_VERSION: &str = "v3.14.0";

/// Prefix of the `ImageSet` that carries digest overrides for this release
pub const IMAGE_SET_PREFIX: &str = "enterprise-";

/// Registry used when the installation does not declare one
pub const DEFAULT_REGISTRY: &str = "quay.io/";

/// License feature that entitles a cluster to intrusion detection
pub const FEATURE_THREAT_DEFENSE: &str = "threat-defense";

/// `APIServer` state reported once the aggregated API is serving
pub const API_SERVER_STATE_READY: &str = "Ready";

// ============================================================================
// Namespaces
// ============================================================================

/// Default namespace the operator runs in and reads its secrets from
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "vigil-operator";

/// Namespace for the intrusion detection controller, installer and detectors
pub const INTRUSION_DETECTION_NAMESPACE: &str = "vigil-intrusion-detection";

/// Namespace for the deep packet inspection daemon set
pub const DPI_NAMESPACE: &str = "vigil-dpi";

/// Default cluster DNS domain
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

// ============================================================================
// Workload Names
// ============================================================================

/// Intrusion detection controller deployment
pub const CONTROLLER_DEPLOYMENT_NAME: &str = "intrusion-detection-controller";

/// Container name inside the controller deployment
pub const CONTROLLER_CONTAINER_NAME: &str = "controller";

/// One-shot Elasticsearch job installer
pub const INSTALLER_JOB_NAME: &str = "intrusion-detection-es-job-installer";

/// Container name inside the installer job
pub const INSTALLER_CONTAINER_NAME: &str = "elasticsearch-job-installer";

/// Base name of the anomaly detection pod templates (`<base>.training`, `<base>.detection`)
pub const AD_JOB_POD_TEMPLATE_BASE_NAME: &str = "vigil.io.detectors";

/// Container name inside the anomaly detection pod templates
pub const AD_JOB_CONTAINER_NAME: &str = "adjobs";

/// Anomaly detection API deployment
pub const AD_API_DEPLOYMENT_NAME: &str = "anomaly-detection-api";

/// Container name inside the anomaly detection API deployment
pub const AD_API_CONTAINER_NAME: &str = "anomaly-detection-api";

/// Deep packet inspection daemon set
pub const DPI_DAEMONSET_NAME: &str = "vigil-dpi";

/// Container name inside the deep packet inspection daemon set
pub const DPI_CONTAINER_NAME: &str = "vigil-dpi";

/// Port the anomaly detection API listens on
pub const AD_API_PORT: i32 = 8080;

// ============================================================================
// Secrets and ConfigMaps (operator namespace)
// ============================================================================

/// Credentials the installer job uses to create indices and jobs
pub const ES_INSTALLER_ACCESS_SECRET: &str = "vigil-ee-installer-elasticsearch-access";

/// Credentials the intrusion detection controller uses
pub const ES_INTRUSION_DETECTION_USER_SECRET: &str =
    "vigil-ee-intrusion-detection-elasticsearch-access";

/// Credentials the anomaly detection jobs use
pub const ES_AD_JOB_USER_SECRET: &str = "vigil-ee-ad-job-elasticsearch-access";

/// Public certificate of the Elasticsearch HTTP endpoint
pub const ES_PUBLIC_CERT_SECRET: &str = "vigil-secure-es-http-certs-public";

/// Elasticsearch cluster settings (cluster name, replicas, shards)
pub const ES_CLUSTER_CONFIG_MAP: &str = "vigil-secure-elasticsearch";

/// Key pair served by the intrusion detection controller
pub const INTRUSION_DETECTION_TLS_SECRET: &str = "intrusion-detection-tls";

/// Key pair served by the anomaly detection API
pub const AD_API_TLS_SECRET: &str = "anomaly-detection-api-tls";

/// Annotation on pod templates carrying the hash of a mounted key pair
pub const KEY_PAIR_HASH_ANNOTATION_PREFIX: &str = "hash.operator.vigil.io/";

// ============================================================================
// Default Resource Requirements
// ============================================================================

/// Default CPU request for deep packet inspection
pub const DPI_DEFAULT_CPU_REQUEST: &str = "100m";

/// Default CPU limit for deep packet inspection
pub const DPI_DEFAULT_CPU_LIMIT: &str = "1";

/// Default memory request for deep packet inspection
pub const DPI_DEFAULT_MEMORY_REQUEST: &str = "100Mi";

/// Default memory limit for deep packet inspection
pub const DPI_DEFAULT_MEMORY_LIMIT: &str = "1Gi";

// ============================================================================
// Elasticsearch Endpoints
// ============================================================================

/// Elasticsearch HTTP service host (without cluster domain)
pub const ES_SERVICE_HOST: &str = "vigil-secure-es-http.vigil-elasticsearch.svc";

/// Elasticsearch HTTP service port
pub const ES_SERVICE_PORT: u16 = 9200;

/// Guardian tunnel host used by managed clusters (without cluster domain)
pub const GUARDIAN_SERVICE_HOST: &str = "vigil-guardian.vigil-guardian.svc";

/// Guardian tunnel port
pub const GUARDIAN_SERVICE_PORT: u16 = 443;

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue after a deferred precondition (flag not ready, license missing)
pub const DEFERRED_REQUEUE: Duration = Duration::from_secs(10);

/// Requeue while rolled-out workloads are not yet available
pub const UNAVAILABLE_REQUEUE: Duration = Duration::from_secs(5);

/// Initial delay for the per-object error backoff
pub const ERROR_BACKOFF_INITIAL_MILLIS: u64 = 100;

/// Upper bound for the per-object error backoff (5 minutes)
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default interval between status publications
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads for the operator runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default address of the metrics and health endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
