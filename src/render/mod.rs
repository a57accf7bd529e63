// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired workload composition.
//!
//! [`compose`] is a pure function from a fully resolved [`RenderContext`] to
//! the ordered [`DesiredObjectSet`] for intrusion detection. It never reads the
//! cluster; every input it needs is carried on the context.
//!
//! # Order
//!
//! 1. copies of every referenced `Secret` in `vigil-intrusion-detection`
//! 2. `Deployment/intrusion-detection-controller`
//! 3. `Job/intrusion-detection-es-job-installer` (not in managed clusters)
//! 4. `PodTemplate/vigil.io.detectors.training`
//! 5. `PodTemplate/vigil.io.detectors.detection`
//! 6. `Deployment/anomaly-detection-api`
//! 7. pull secret copies in `vigil-dpi`, then `DaemonSet/vigil-dpi` (only when
//!    `DeepPacketInspection` resources exist)

use crate::certificates::KeyPair;
use crate::components::ImageOverrides;
use crate::constants::{
    API_GROUP_VERSION, CONTROLLER_DEPLOYMENT_NAME, DPI_DAEMONSET_NAME, DPI_NAMESPACE,
    INSTALLER_JOB_NAME, INTRUSION_DETECTION_NAMESPACE, KIND_INTRUSION_DETECTION,
};
use crate::crd::IntrusionDetection;
use crate::errors::ImageError;
use crate::labels::{
    K8S_COMPONENT, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_INTRUSION_DETECTION,
    PART_OF_VIGIL, VIGIL_APP_LABEL,
};
use crate::status::NamespacedName;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    LocalObjectReference, PodTemplate, ResourceRequirements, Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub mod dpi;
pub mod elasticsearch;
pub mod intrusion_detection;
pub mod secrets;

pub use elasticsearch::ElasticsearchClusterConfig;

/// Role of this cluster in a multi-cluster deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterRole {
    Standalone,
    /// Hosts Elasticsearch for managed clusters.
    ManagementCluster,
    /// Ships data to a management cluster through the guardian tunnel.
    ManagedCluster,
}

impl ClusterRole {
    #[must_use]
    pub fn is_managed(self) -> bool {
        self == Self::ManagedCluster
    }
}

/// Everything needed to render the intrusion detection workloads.
///
/// Only constructed once every required input has been found.
#[derive(Clone, Debug)]
pub struct RenderContext {
    /// Owner reference to the `IntrusionDetection` instance
    pub owner_references: Vec<OwnerReference>,
    /// Registry prefix, always ending with `/`
    pub registry: String,
    pub image_path: Option<String>,
    pub overrides: ImageOverrides,
    pub role: ClusterRole,
    pub pull_secrets: Vec<LocalObjectReference>,
    /// Namespace the source secrets were read from
    pub operator_namespace: String,
    /// Every secret the rendered pods reference, as read from the operator namespace
    pub secrets: Vec<Secret>,
    pub elasticsearch: ElasticsearchClusterConfig,
    /// Key pair served by the intrusion detection controller
    pub controller_key_pair: KeyPair,
    /// Key pair served by the anomaly detection API
    pub ad_api_key_pair: KeyPair,
    /// Whether the Elasticsearch public certificate is mounted (non-managed only)
    pub mount_es_public_cert: bool,
    /// `DeepPacketInspection` resources found across all namespaces
    pub dpi_resources: Vec<NamespacedName>,
    /// Resolved DPI resource requirements (user values or defaults)
    pub dpi_resource_requirements: ResourceRequirements,
    pub cluster_domain: String,
}

/// Kind of an object the composer manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Secret,
    Deployment,
    Job,
    PodTemplate,
    DaemonSet,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Secret => "Secret",
            Self::Deployment => "Deployment",
            Self::Job => "Job",
            Self::PodTemplate => "PodTemplate",
            Self::DaemonSet => "DaemonSet",
        };
        f.write_str(kind)
    }
}

/// Kind, namespace and name of a managed object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    #[must_use]
    pub fn new(kind: ObjectKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A fully rendered object.
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredObject {
    Secret(Secret),
    Deployment(Deployment),
    Job(Job),
    PodTemplate(PodTemplate),
    DaemonSet(DaemonSet),
}

impl DesiredObject {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Secret(_) => ObjectKind::Secret,
            Self::Deployment(_) => ObjectKind::Deployment,
            Self::Job(_) => ObjectKind::Job,
            Self::PodTemplate(_) => ObjectKind::PodTemplate,
            Self::DaemonSet(_) => ObjectKind::DaemonSet,
        }
    }

    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        let (namespace, name) = match self {
            Self::Secret(o) => (o.namespace(), o.name_any()),
            Self::Deployment(o) => (o.namespace(), o.name_any()),
            Self::Job(o) => (o.namespace(), o.name_any()),
            Self::PodTemplate(o) => (o.namespace(), o.name_any()),
            Self::DaemonSet(o) => (o.namespace(), o.name_any()),
        };
        ObjectRef {
            kind: self.kind(),
            namespace: namespace.unwrap_or_default(),
            name,
        }
    }
}

/// Ordered desired objects plus the objects that must not exist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesiredObjectSet {
    pub objects: Vec<DesiredObject>,
    pub obsolete: Vec<ObjectRef>,
}

impl DesiredObjectSet {
    /// References of desired objects of `kind`, in order.
    #[must_use]
    pub fn refs_of(&self, kind: ObjectKind) -> Vec<NamespacedName> {
        self.objects
            .iter()
            .filter(|o| o.kind() == kind)
            .map(|o| o.object_ref().namespaced_name())
            .collect()
    }

    /// References of obsolete objects of `kind`.
    #[must_use]
    pub fn obsolete_of(&self, kind: ObjectKind) -> Vec<NamespacedName> {
        self.obsolete
            .iter()
            .filter(|o| o.kind == kind)
            .map(ObjectRef::namespaced_name)
            .collect()
    }
}

/// Render the desired set for `ctx`.
///
/// # Errors
///
/// Returns an [`ImageError`] if any component image cannot be resolved.
pub fn compose(ctx: &RenderContext) -> Result<DesiredObjectSet, ImageError> {
    let mut set = DesiredObjectSet::default();

    set.objects.extend(
        secrets::build_workload_secrets(ctx)
            .into_iter()
            .map(DesiredObject::Secret),
    );

    set.objects.push(DesiredObject::Deployment(
        intrusion_detection::build_controller_deployment(ctx)?,
    ));

    if ctx.role.is_managed() {
        set.obsolete
            .extend(secrets::managed_cluster_obsolete_secrets(ctx));
        set.obsolete.push(installer_job_ref());
    } else {
        set.objects
            .push(DesiredObject::Job(intrusion_detection::build_installer_job(ctx)?));
    }

    for template in intrusion_detection::build_ad_pod_templates(ctx)? {
        set.objects.push(DesiredObject::PodTemplate(template));
    }

    set.objects.push(DesiredObject::Deployment(
        intrusion_detection::build_ad_api_deployment(ctx)?,
    ));

    if ctx.dpi_resources.is_empty() {
        set.obsolete.push(dpi_daemonset_ref());
        set.obsolete.extend(secrets::dpi_obsolete_secrets(ctx));
    } else {
        set.objects.extend(
            secrets::build_dpi_secrets(ctx)
                .into_iter()
                .map(DesiredObject::Secret),
        );
        set.objects
            .push(DesiredObject::DaemonSet(dpi::build_dpi_daemonset(ctx)?));
    }

    debug!(
        desired = set.objects.len(),
        obsolete = set.obsolete.len(),
        role = ?ctx.role,
        "Composed intrusion detection objects"
    );
    Ok(set)
}

/// Every workload [`compose`] can produce, as obsolete references.
///
/// Used when the license does not cover intrusion detection. Secret copies
/// stay until the owning `IntrusionDetection` is deleted.
#[must_use]
pub fn compose_teardown() -> DesiredObjectSet {
    DesiredObjectSet {
        objects: Vec::new(),
        obsolete: vec![
            ObjectRef::new(
                ObjectKind::Deployment,
                INTRUSION_DETECTION_NAMESPACE,
                CONTROLLER_DEPLOYMENT_NAME,
            ),
            installer_job_ref(),
            ObjectRef::new(
                ObjectKind::PodTemplate,
                INTRUSION_DETECTION_NAMESPACE,
                &intrusion_detection::ad_pod_template_name(intrusion_detection::AdCycle::Training),
            ),
            ObjectRef::new(
                ObjectKind::PodTemplate,
                INTRUSION_DETECTION_NAMESPACE,
                &intrusion_detection::ad_pod_template_name(intrusion_detection::AdCycle::Detection),
            ),
            ObjectRef::new(
                ObjectKind::Deployment,
                INTRUSION_DETECTION_NAMESPACE,
                crate::constants::AD_API_DEPLOYMENT_NAME,
            ),
            dpi_daemonset_ref(),
        ],
    }
}

fn installer_job_ref() -> ObjectRef {
    ObjectRef::new(ObjectKind::Job, INTRUSION_DETECTION_NAMESPACE, INSTALLER_JOB_NAME)
}

fn dpi_daemonset_ref() -> ObjectRef {
    ObjectRef::new(ObjectKind::DaemonSet, DPI_NAMESPACE, DPI_DAEMONSET_NAME)
}

/// Builds owner references for an object owned by the `IntrusionDetection` instance.
///
/// The instance is cluster-scoped, so namespaced children may point at it.
#[must_use]
pub fn build_owner_references(instance: &IntrusionDetection) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_INTRUSION_DETECTION.to_string(),
        name: instance.name_any(),
        uid: instance.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Standard labels for a rendered object.
#[must_use]
pub fn build_labels(name: &str, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(K8S_NAME.to_string(), name.to_string());
    labels.insert(K8S_COMPONENT.to_string(), component.to_string());
    labels.insert(K8S_PART_OF.to_string(), PART_OF_VIGIL.to_string());
    labels.insert(
        K8S_MANAGED_BY.to_string(),
        MANAGED_BY_INTRUSION_DETECTION.to_string(),
    );
    labels.insert(VIGIL_APP_LABEL.to_string(), name.to_string());
    labels
}

/// Pod selector labels for a workload.
#[must_use]
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(VIGIL_APP_LABEL.to_string(), name.to_string())])
}

/// Standalone context with default images and one DPI resource.
#[cfg(test)]
pub(crate) fn test_context(role: ClusterRole) -> RenderContext {
    use crate::constants::{
        AD_API_TLS_SECRET, DEFAULT_OPERATOR_NAMESPACE, DEFAULT_REGISTRY, ES_AD_JOB_USER_SECRET,
        ES_INSTALLER_ACCESS_SECRET, ES_INTRUSION_DETECTION_USER_SECRET, ES_PUBLIC_CERT_SECRET,
        INTRUSION_DETECTION_TLS_SECRET,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;

    let key_pair = |secret: &str, hash: &str| KeyPair {
        secret_name: secret.to_string(),
        namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
        hash: hash.to_string(),
    };
    let source_secret = |name: &str| Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(DEFAULT_OPERATOR_NAMESPACE.to_string()),
            resource_version: Some("7".to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(name.as_bytes().to_vec()),
        )])),
        ..Default::default()
    };

    let mut secret_names = Vec::new();
    if !role.is_managed() {
        secret_names.push(ES_INSTALLER_ACCESS_SECRET);
    }
    secret_names.extend([ES_INTRUSION_DETECTION_USER_SECRET, ES_AD_JOB_USER_SECRET]);
    if !role.is_managed() {
        secret_names.push(ES_PUBLIC_CERT_SECRET);
    }
    secret_names.extend([INTRUSION_DETECTION_TLS_SECRET, AD_API_TLS_SECRET]);

    RenderContext {
        owner_references: vec![OwnerReference {
            api_version: API_GROUP_VERSION.to_string(),
            kind: KIND_INTRUSION_DETECTION.to_string(),
            name: "default".to_string(),
            uid: "uid-1".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }],
        registry: DEFAULT_REGISTRY.to_string(),
        image_path: None,
        overrides: ImageOverrides::default(),
        role,
        pull_secrets: Vec::new(),
        operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
        secrets: secret_names.into_iter().map(source_secret).collect(),
        elasticsearch: ElasticsearchClusterConfig {
            cluster_name: "cluster".to_string(),
            replicas: 1,
            shards: 1,
        },
        controller_key_pair: key_pair(INTRUSION_DETECTION_TLS_SECRET, "aaaa"),
        ad_api_key_pair: key_pair(AD_API_TLS_SECRET, "bbbb"),
        mount_es_public_cert: !role.is_managed(),
        dpi_resources: vec![NamespacedName::new("test-dpi-ns", "test-dpi")],
        dpi_resource_requirements: ResourceRequirements::default(),
        cluster_domain: crate::constants::DEFAULT_CLUSTER_DOMAIN.to_string(),
    }
}
