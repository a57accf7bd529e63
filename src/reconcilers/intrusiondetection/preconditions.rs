// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Precondition resolution for `IntrusionDetection`.
//!
//! Gathers every input the composer needs, in a fixed order, and turns the
//! first missing one into a [`Resolution`] or a [`PreconditionError`]:
//!
//! 1. API readiness latches ([`check_readiness`])
//! 2. `Installation/default` and its variant
//! 3. pull secrets, `ImageSet`, `LicenseKey` and its feature list
//! 4. `APIServer/vigil-secure`
//! 5. cluster topology markers
//! 6. Elasticsearch access secrets (aggregated into one report)
//! 7. Elasticsearch config map and public certificate
//! 8. TLS key pairs
//! 9. `DeepPacketInspection` resources
//!
//! Nothing here writes to the cluster.

use super::defaults::default_dpi_requirements;
use crate::certificates::{service_dns_names, CertificateManager};
use crate::components::{
    image_set_name, resolve_image_path, resolve_registry, ImageOverrides,
};
use crate::config::ReconcilerConfig;
use crate::constants::{
    AD_API_DEPLOYMENT_NAME, AD_API_TLS_SECRET, API_SERVER_STATE_READY, CONTROLLER_DEPLOYMENT_NAME,
    DEFAULT_INSTANCE_NAME, DEFERRED_REQUEUE, ES_AD_JOB_USER_SECRET, ES_CLUSTER_CONFIG_MAP,
    ES_INSTALLER_ACCESS_SECRET, ES_INTRUSION_DETECTION_USER_SECRET, ES_PUBLIC_CERT_SECRET,
    FEATURE_THREAT_DEFENSE, INTRUSION_DETECTION_NAMESPACE, INTRUSION_DETECTION_TLS_SECRET,
    SECURE_INSTANCE_NAME,
};
use crate::crd::{
    APIServer, ComponentName, DeepPacketInspection, ImageSet, Installation, IntrusionDetection,
    LicenseKey, ManagementCluster, ManagementClusterConnection, ProductVariant,
};
use crate::errors::PreconditionError;
use crate::readiness::ReadyFlag;
use crate::render::{build_owner_references, ClusterRole, ElasticsearchClusterConfig, RenderContext};
use crate::status::NamespacedName;
use crate::status_reasons::{
    waiting_for_api, DEGRADED_API_SERVER, DEGRADED_ES_SECRETS_UNAVAILABLE,
    DEGRADED_FEATURE_NOT_ACTIVE, DEGRADED_FEATURE_NOT_ACTIVE_MESSAGE,
    DEGRADED_INSTALLATION_VARIANT, DEGRADED_LICENSE,
};
use crate::store::{get_optional, ObjectStore};
use k8s_openapi::api::core::v1::{ConfigMap, LocalObjectReference, Secret};
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of resolving preconditions.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// Everything is in place; render with this context.
    Ready(Box<RenderContext>),
    /// An input is not there yet. Report degraded and check again later.
    Deferred {
        reason: String,
        message: String,
        requeue: Duration,
    },
    /// The license does not cover intrusion detection.
    Unlicensed { reason: String, message: String },
}

impl Resolution {
    fn deferred(reason: &str, message: impl Into<String>, requeue: Duration) -> Self {
        Self::Deferred {
            reason: reason.to_string(),
            message: message.into(),
            requeue,
        }
    }
}

/// Defer the pass until both dependent APIs are being served.
///
/// Returns `None` when both latches are set.
#[must_use]
pub fn check_readiness(license_api: &ReadyFlag, dpi_api: &ReadyFlag) -> Option<Resolution> {
    [license_api, dpi_api]
        .into_iter()
        .find(|flag| !flag.is_ready())
        .map(|flag| {
            debug!(api = %flag.name(), "Dependent API is not ready yet");
            Resolution::deferred(&waiting_for_api(flag.name()), "", DEFERRED_REQUEUE)
        })
}

/// Variant from `spec.variant`, then `status.computed.variant`, then `status.variant`.
fn effective_variant(installation: &Installation) -> Option<ProductVariant> {
    let status = installation.status.as_ref();
    installation
        .spec
        .variant
        .or_else(|| status.and_then(|s| s.computed.as_ref()).and_then(|c| c.variant))
        .or_else(|| status.and_then(|s| s.variant))
}

fn effective_pull_secrets(installation: &Installation) -> Vec<LocalObjectReference> {
    installation
        .spec
        .image_pull_secrets
        .clone()
        .or_else(|| {
            installation
                .status
                .as_ref()
                .and_then(|s| s.computed.as_ref())
                .and_then(|c| c.image_pull_secrets.clone())
        })
        .unwrap_or_default()
}

/// Secrets named in `names` found in `namespace`, and the names not found.
async fn fetch_secrets<S: ObjectStore>(
    store: &S,
    namespace: &str,
    names: &[&str],
) -> Result<(Vec<Secret>, Vec<String>), PreconditionError> {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match get_optional::<Secret, _>(store, Some(namespace), name).await? {
            Some(secret) => found.push(secret),
            None => missing.push((*name).to_string()),
        }
    }
    Ok((found, missing))
}

/// Add `found` to `secrets`, skipping names already present.
fn collect_secrets(secrets: &mut Vec<Secret>, found: Vec<Secret>) {
    for secret in found {
        if !secrets.iter().any(|s| s.name_any() == secret.name_any()) {
            secrets.push(secret);
        }
    }
}

/// Message listing missing secrets, e.g. `secrets "a", "b" not found`.
#[must_use]
pub fn secrets_not_found_message(missing: &[String]) -> String {
    let quoted: Vec<String> = missing.iter().map(|name| format!("\"{name}\"")).collect();
    format!("secrets {} not found", quoted.join(", "))
}

/// Elasticsearch access secrets the workloads need for `role`.
///
/// Managed clusters do not run the index installer, so they do not need its
/// credentials.
#[must_use]
pub fn required_access_secrets(role: ClusterRole) -> Vec<&'static str> {
    let mut secrets = Vec::with_capacity(3);
    if !role.is_managed() {
        secrets.push(ES_INSTALLER_ACCESS_SECRET);
    }
    secrets.push(ES_INTRUSION_DETECTION_USER_SECRET);
    secrets.push(ES_AD_JOB_USER_SECRET);
    secrets
}

async fn resolve_role<S: ObjectStore>(store: &S) -> Result<ClusterRole, PreconditionError> {
    let management =
        get_optional::<ManagementCluster, _>(store, None, SECURE_INSTANCE_NAME).await?;
    let connection =
        get_optional::<ManagementClusterConnection, _>(store, None, SECURE_INSTANCE_NAME).await?;

    match (management, connection) {
        (Some(_), Some(_)) => Err(PreconditionError::ConflictingTopology),
        (Some(_), None) => Ok(ClusterRole::ManagementCluster),
        (None, Some(_)) => Ok(ClusterRole::ManagedCluster),
        (None, None) => Ok(ClusterRole::Standalone),
    }
}

/// Resolve every input needed to render intrusion detection for `instance`.
///
/// Readiness latches are checked separately by [`check_readiness`].
///
/// # Errors
///
/// Returns a [`PreconditionError`] for inputs that are missing or invalid in a
/// way that will not fix itself without user action, or when the store fails.
pub async fn resolve<S: ObjectStore>(
    store: &S,
    certs: &dyn CertificateManager,
    config: &ReconcilerConfig,
    instance: &IntrusionDetection,
) -> Result<Resolution, PreconditionError> {
    let operator_ns = config.operator_namespace.as_str();

    // Installation
    let installation = get_optional::<Installation, _>(store, None, DEFAULT_INSTANCE_NAME)
        .await?
        .ok_or_else(|| PreconditionError::InstallationNotFound {
            name: DEFAULT_INSTANCE_NAME.to_string(),
        })?;

    let variant = effective_variant(&installation);
    if variant != Some(ProductVariant::Enterprise) {
        info!(variant = ?variant, "Installation is not enterprise, deferring");
        return Ok(Resolution::deferred(
            DEGRADED_INSTALLATION_VARIANT,
            format!("installation variant is {variant:?}, intrusion detection requires Enterprise"),
            DEFERRED_REQUEUE,
        ));
    }

    let pull_secrets = effective_pull_secrets(&installation);
    let names: Vec<&str> = pull_secrets.iter().map(|s| s.name.as_str()).collect();
    let (found, missing) = fetch_secrets(store, operator_ns, &names).await?;
    if !missing.is_empty() {
        return Err(PreconditionError::PullSecretsMissing {
            namespace: operator_ns.to_string(),
            missing,
        });
    }
    let mut secrets = Vec::new();
    collect_secrets(&mut secrets, found);

    // Images
    let overrides = match get_optional::<ImageSet, _>(store, None, &image_set_name()).await? {
        Some(image_set) => ImageOverrides::from_image_set(&image_set)?,
        None => ImageOverrides::default(),
    };

    // License
    let license = get_optional::<LicenseKey, _>(store, None, DEFAULT_INSTANCE_NAME)
        .await
        .map_err(PreconditionError::License)?;
    let Some(license) = license else {
        return Ok(Resolution::deferred(
            DEGRADED_LICENSE,
            format!("licensekeys \"{DEFAULT_INSTANCE_NAME}\" not found"),
            DEFERRED_REQUEUE,
        ));
    };
    if !license.has_feature(FEATURE_THREAT_DEFENSE) {
        info!("License does not include {FEATURE_THREAT_DEFENSE}");
        return Ok(Resolution::Unlicensed {
            reason: DEGRADED_FEATURE_NOT_ACTIVE.to_string(),
            message: DEGRADED_FEATURE_NOT_ACTIVE_MESSAGE.to_string(),
        });
    }

    // API server
    let api_server = get_optional::<APIServer, _>(store, None, SECURE_INSTANCE_NAME).await?;
    let api_state = api_server
        .as_ref()
        .and_then(|a| a.status.as_ref())
        .and_then(|s| s.state.as_deref());
    if api_state != Some(API_SERVER_STATE_READY) {
        let message = match api_server {
            Some(_) => format!("apiserver {SECURE_INSTANCE_NAME} is not ready"),
            None => format!("apiservers \"{SECURE_INSTANCE_NAME}\" not found"),
        };
        return Ok(Resolution::deferred(
            DEGRADED_API_SERVER,
            message,
            DEFERRED_REQUEUE,
        ));
    }

    let role = resolve_role(store).await?;
    debug!(role = ?role, "Resolved cluster role");

    // Elasticsearch
    let (found, missing) =
        fetch_secrets(store, operator_ns, &required_access_secrets(role)).await?;
    if !missing.is_empty() {
        info!(missing = ?missing, "Elasticsearch access secrets are not available yet");
        return Ok(Resolution::deferred(
            DEGRADED_ES_SECRETS_UNAVAILABLE,
            secrets_not_found_message(&missing),
            Duration::ZERO,
        ));
    }
    collect_secrets(&mut secrets, found);

    let config_map = get_optional::<ConfigMap, _>(store, Some(operator_ns), ES_CLUSTER_CONFIG_MAP)
        .await?
        .ok_or_else(|| {
            PreconditionError::ElasticsearchConfig(format!(
                "configmap {ES_CLUSTER_CONFIG_MAP} not found in namespace {operator_ns}"
            ))
        })?;
    let elasticsearch = ElasticsearchClusterConfig::from_config_map(&config_map)?;

    let mount_es_public_cert = !role.is_managed();
    if mount_es_public_cert {
        let public_cert =
            get_optional::<Secret, _>(store, Some(operator_ns), ES_PUBLIC_CERT_SECRET)
                .await?
                .ok_or_else(|| {
                    PreconditionError::ElasticsearchConfig(format!(
                        "secret {ES_PUBLIC_CERT_SECRET} not found in namespace {operator_ns}"
                    ))
                })?;
        collect_secrets(&mut secrets, vec![public_cert]);
    }

    // TLS
    let controller_key_pair = certs
        .get_or_create_key_pair(
            INTRUSION_DETECTION_TLS_SECRET,
            operator_ns,
            &service_dns_names(
                CONTROLLER_DEPLOYMENT_NAME,
                INTRUSION_DETECTION_NAMESPACE,
                &config.cluster_domain,
            ),
        )
        .await?;
    let ad_api_key_pair = certs
        .get_or_create_key_pair(
            AD_API_TLS_SECRET,
            operator_ns,
            &service_dns_names(
                AD_API_DEPLOYMENT_NAME,
                INTRUSION_DETECTION_NAMESPACE,
                &config.cluster_domain,
            ),
        )
        .await?;
    for key_pair in [&controller_key_pair, &ad_api_key_pair] {
        let secret = store
            .get::<Secret>(Some(&key_pair.namespace), &key_pair.secret_name)
            .await?;
        collect_secrets(&mut secrets, vec![secret]);
    }

    // Deep packet inspection
    let dpi_resources: Vec<NamespacedName> = store
        .list::<DeepPacketInspection>(None)
        .await
        .map_err(PreconditionError::DpiList)?
        .iter()
        .map(|dpi| NamespacedName::new(dpi.namespace().unwrap_or_default(), dpi.name_any()))
        .collect();
    let dpi_resource_requirements = instance
        .spec
        .resource_requirements_for(ComponentName::DeepPacketInspection)
        .cloned()
        .unwrap_or_else(default_dpi_requirements);

    debug!(
        role = ?role,
        dpi_resources = dpi_resources.len(),
        image_overrides = !overrides.is_empty(),
        "All preconditions resolved"
    );

    Ok(Resolution::Ready(Box::new(RenderContext {
        owner_references: build_owner_references(instance),
        registry: resolve_registry(&installation),
        image_path: resolve_image_path(&installation),
        overrides,
        role,
        pull_secrets,
        operator_namespace: operator_ns.to_string(),
        secrets,
        elasticsearch,
        controller_key_pair,
        ad_api_key_pair,
        mount_es_public_cert,
        dpi_resources,
        dpi_resource_requirements,
        cluster_domain: config.cluster_domain.clone(),
    })))
}

#[cfg(test)]
#[path = "preconditions_tests.rs"]
mod preconditions_tests;
