// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Intrusion detection workload builders
//!
//! Builds the controller `Deployment`, the Elasticsearch installer `Job`, the
//! anomaly detection `PodTemplate`s and the anomaly detection API
//! `Deployment`. All functions are pure.

use super::elasticsearch::elasticsearch_endpoint;
use super::{build_labels, selector_labels, RenderContext};
use crate::certificates::{KeyPair, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::components::{
    resolve_image, ComponentImage, COMPONENT_ANOMALY_DETECTION_API,
    COMPONENT_ANOMALY_DETECTION_JOBS, COMPONENT_ELASTICSEARCH_INSTALLER,
    COMPONENT_INTRUSION_DETECTION_CONTROLLER,
};
use crate::constants::{
    AD_API_CONTAINER_NAME, AD_API_DEPLOYMENT_NAME, AD_API_PORT, AD_JOB_CONTAINER_NAME,
    AD_JOB_POD_TEMPLATE_BASE_NAME, CONTROLLER_CONTAINER_NAME, CONTROLLER_DEPLOYMENT_NAME,
    ES_AD_JOB_USER_SECRET, ES_INSTALLER_ACCESS_SECRET, ES_INTRUSION_DETECTION_USER_SECRET,
    ES_PUBLIC_CERT_SECRET, INSTALLER_CONTAINER_NAME, INSTALLER_JOB_NAME,
    INTRUSION_DETECTION_NAMESPACE,
};
use crate::errors::ImageError;
use crate::labels::{
    COMPONENT_AD_API, COMPONENT_AD_JOBS, COMPONENT_CONTROLLER, COMPONENT_INSTALLER,
    VIGIL_AD_CYCLE_LABEL,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EnvVar, EnvVarSource, ExecAction, HTTPGetAction,
    PodSpec, PodTemplate, PodTemplateSpec, Probe, SecretKeySelector, SecretVolumeSource,
    SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

// Mount points
const HTTPS_CERTS_PATH: &str = "/certs/https";
const ES_CERTS_PATH: &str = "/certs/elasticsearch";

// Volume names
const VOLUME_TLS: &str = "tls-key-pair";
const VOLUME_ES_CERTS: &str = "elastic-ca-cert";

// Keys inside the Elasticsearch access secrets
const ES_USERNAME_KEY: &str = "username";
const ES_PASSWORD_KEY: &str = "password";

const INSTALLER_BACKOFF_LIMIT: i32 = 6;

/// Anomaly detection cycle a pod template runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdCycle {
    Training,
    Detection,
}

impl AdCycle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Detection => "detection",
        }
    }
}

/// `vigil.io.detectors.<cycle>`
#[must_use]
pub fn ad_pod_template_name(cycle: AdCycle) -> String {
    format!("{AD_JOB_POD_TEMPLATE_BASE_NAME}.{}", cycle.as_str())
}

fn image_for(ctx: &RenderContext, component: &ComponentImage) -> Result<String, ImageError> {
    resolve_image(
        component,
        &ctx.registry,
        ctx.image_path.as_deref(),
        &ctx.overrides,
    )
}

fn object_meta(ctx: &RenderContext, name: &str, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(INTRUSION_DETECTION_NAMESPACE.to_string()),
        labels: Some(build_labels(name, component)),
        owner_references: Some(ctx.owner_references.clone()),
        ..Default::default()
    }
}

fn plain_env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `ELASTIC_*` connection variables, with credentials from `user_secret`.
fn elasticsearch_env(ctx: &RenderContext, user_secret: &str) -> Vec<EnvVar> {
    let (host, port) = elasticsearch_endpoint(ctx.role, &ctx.cluster_domain);
    let mut env = vec![
        plain_env("CLUSTER_NAME", ctx.elasticsearch.cluster_name.clone()),
        plain_env("ELASTIC_HOST", host),
        plain_env("ELASTIC_PORT", port.to_string()),
        plain_env("ELASTIC_SCHEME", "https"),
        secret_env("ELASTIC_USER", user_secret, ES_USERNAME_KEY),
        secret_env("ELASTIC_PASSWORD", user_secret, ES_PASSWORD_KEY),
    ];
    if ctx.mount_es_public_cert {
        env.push(plain_env(
            "ELASTIC_CA",
            format!("{ES_CERTS_PATH}/{TLS_CERT_KEY}"),
        ));
    }
    env
}

fn secret_volume(name: &str, secret: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn read_only_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        read_only: Some(true),
        ..Default::default()
    }
}

/// Volumes and mounts for the Elasticsearch CA, if it is mounted at all.
fn es_cert_volume(ctx: &RenderContext) -> Option<(Volume, VolumeMount)> {
    ctx.mount_es_public_cert.then(|| {
        (
            secret_volume(VOLUME_ES_CERTS, ES_PUBLIC_CERT_SECRET),
            read_only_mount(VOLUME_ES_CERTS, ES_CERTS_PATH),
        )
    })
}

fn key_pair_annotations(key_pair: &KeyPair) -> BTreeMap<String, String> {
    BTreeMap::from([(key_pair.hash_annotation_key(), key_pair.hash.clone())])
}

fn restricted_security_context() -> SecurityContext {
    SecurityContext {
        run_as_non_root: Some(true),
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod_spec(ctx: &RenderContext, container: Container, volumes: Vec<Volume>) -> PodSpec {
    PodSpec {
        containers: vec![container],
        volumes: (!volumes.is_empty()).then_some(volumes),
        image_pull_secrets: (!ctx.pull_secrets.is_empty()).then(|| ctx.pull_secrets.clone()),
        ..Default::default()
    }
}

fn single_replica_deployment(
    ctx: &RenderContext,
    name: &str,
    component: &str,
    annotations: BTreeMap<String, String>,
    spec: PodSpec,
) -> Deployment {
    let labels = build_labels(name, component);
    Deployment {
        metadata: object_meta(ctx, name, component),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(spec),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the intrusion detection controller `Deployment`.
///
/// Mounts the controller key pair and, outside managed clusters, the
/// Elasticsearch public certificate. The pod template carries the key pair
/// hash so certificate rotation rolls the pods.
///
/// # Errors
///
/// Returns an [`ImageError`] if the controller image cannot be resolved.
pub fn build_controller_deployment(ctx: &RenderContext) -> Result<Deployment, ImageError> {
    let mut volumes = vec![secret_volume(
        VOLUME_TLS,
        &ctx.controller_key_pair.secret_name,
    )];
    let mut mounts = vec![read_only_mount(VOLUME_TLS, HTTPS_CERTS_PATH)];
    if let Some((volume, mount)) = es_cert_volume(ctx) {
        volumes.push(volume);
        mounts.push(mount);
    }

    let mut env = elasticsearch_env(ctx, ES_INTRUSION_DETECTION_USER_SECRET);
    env.push(plain_env(
        "TLS_CERT_PATH",
        format!("{HTTPS_CERTS_PATH}/{TLS_CERT_KEY}"),
    ));
    env.push(plain_env(
        "TLS_KEY_PATH",
        format!("{HTTPS_CERTS_PATH}/{TLS_PRIVATE_KEY_KEY}"),
    ));

    let container = Container {
        name: CONTROLLER_CONTAINER_NAME.to_string(),
        image: Some(image_for(ctx, &COMPONENT_INTRUSION_DETECTION_CONTROLLER)?),
        env: Some(env),
        volume_mounts: Some(mounts),
        liveness_probe: Some(Probe {
            exec: Some(ExecAction {
                command: Some(vec!["/healthz".to_string(), "liveness".to_string()]),
            }),
            initial_delay_seconds: Some(5),
            ..Default::default()
        }),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    Ok(single_replica_deployment(
        ctx,
        CONTROLLER_DEPLOYMENT_NAME,
        COMPONENT_CONTROLLER,
        key_pair_annotations(&ctx.controller_key_pair),
        pod_spec(ctx, container, volumes),
    ))
}

/// Build the one-shot Elasticsearch installer `Job`.
///
/// Only rendered for standalone and management clusters; managed clusters use
/// the management cluster's indices.
///
/// # Errors
///
/// Returns an [`ImageError`] if the installer image cannot be resolved.
pub fn build_installer_job(ctx: &RenderContext) -> Result<Job, ImageError> {
    let mut env = elasticsearch_env(ctx, ES_INSTALLER_ACCESS_SECRET);
    env.push(plain_env("ES_REPLICAS", ctx.elasticsearch.replicas.to_string()));
    env.push(plain_env("ES_SHARDS", ctx.elasticsearch.shards.to_string()));

    let (volumes, mounts) = es_cert_volume(ctx).map_or((Vec::new(), Vec::new()), |(v, m)| {
        (vec![v], vec![m])
    });

    let container = Container {
        name: INSTALLER_CONTAINER_NAME.to_string(),
        image: Some(image_for(ctx, &COMPONENT_ELASTICSEARCH_INSTALLER)?),
        env: Some(env),
        volume_mounts: (!mounts.is_empty()).then_some(mounts),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    let mut spec = pod_spec(ctx, container, volumes);
    spec.restart_policy = Some("OnFailure".to_string());

    Ok(Job {
        metadata: object_meta(ctx, INSTALLER_JOB_NAME, COMPONENT_INSTALLER),
        spec: Some(JobSpec {
            backoff_limit: Some(INSTALLER_BACKOFF_LIMIT),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(build_labels(INSTALLER_JOB_NAME, COMPONENT_INSTALLER)),
                    ..Default::default()
                }),
                spec: Some(spec),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn build_ad_pod_template(ctx: &RenderContext, cycle: AdCycle, image: &str) -> PodTemplate {
    let name = ad_pod_template_name(cycle);
    let mut labels = build_labels(&name, COMPONENT_AD_JOBS);
    labels.insert(VIGIL_AD_CYCLE_LABEL.to_string(), cycle.as_str().to_string());

    let mut env = elasticsearch_env(ctx, ES_AD_JOB_USER_SECRET);
    env.push(plain_env("AD_CYCLE", cycle.as_str()));

    let (volumes, mounts) = es_cert_volume(ctx).map_or((Vec::new(), Vec::new()), |(v, m)| {
        (vec![v], vec![m])
    });

    let container = Container {
        name: AD_JOB_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        env: Some(env),
        volume_mounts: (!mounts.is_empty()).then_some(mounts),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    let mut spec = pod_spec(ctx, container, volumes);
    spec.restart_policy = Some("OnFailure".to_string());

    let mut metadata = object_meta(ctx, &name, COMPONENT_AD_JOBS);
    metadata.labels = Some(labels.clone());

    PodTemplate {
        metadata,
        template: Some(PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            }),
            spec: Some(spec),
        }),
    }
}

/// Build the training and detection `PodTemplate`s, in that order.
///
/// # Errors
///
/// Returns an [`ImageError`] if the anomaly detection jobs image cannot be resolved.
pub fn build_ad_pod_templates(ctx: &RenderContext) -> Result<Vec<PodTemplate>, ImageError> {
    let image = image_for(ctx, &COMPONENT_ANOMALY_DETECTION_JOBS)?;
    Ok([AdCycle::Training, AdCycle::Detection]
        .into_iter()
        .map(|cycle| build_ad_pod_template(ctx, cycle, &image))
        .collect())
}

/// Build the anomaly detection API `Deployment`.
///
/// # Errors
///
/// Returns an [`ImageError`] if the API image cannot be resolved.
pub fn build_ad_api_deployment(ctx: &RenderContext) -> Result<Deployment, ImageError> {
    let container = Container {
        name: AD_API_CONTAINER_NAME.to_string(),
        image: Some(image_for(ctx, &COMPONENT_ANOMALY_DETECTION_API)?),
        ports: Some(vec![ContainerPort {
            name: Some("https".to_string()),
            container_port: AD_API_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![
            plain_env("LOG_LEVEL", "info"),
            plain_env("LISTEN_PORT", AD_API_PORT.to_string()),
            plain_env(
                "TLS_CERT_PATH",
                format!("{HTTPS_CERTS_PATH}/{TLS_CERT_KEY}"),
            ),
            plain_env(
                "TLS_KEY_PATH",
                format!("{HTTPS_CERTS_PATH}/{TLS_PRIVATE_KEY_KEY}"),
            ),
        ]),
        volume_mounts: Some(vec![read_only_mount(VOLUME_TLS, HTTPS_CERTS_PATH)]),
        readiness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some("/health".to_string()),
                port: IntOrString::Int(AD_API_PORT),
                scheme: Some("HTTPS".to_string()),
                ..Default::default()
            }),
            initial_delay_seconds: Some(10),
            period_seconds: Some(10),
            ..Default::default()
        }),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    };

    let volumes = vec![secret_volume(VOLUME_TLS, &ctx.ad_api_key_pair.secret_name)];

    Ok(single_replica_deployment(
        ctx,
        AD_API_DEPLOYMENT_NAME,
        COMPONENT_AD_API,
        key_pair_annotations(&ctx.ad_api_key_pair),
        pod_spec(ctx, container, volumes),
    ))
}

#[cfg(test)]
#[path = "intrusion_detection_tests.rs"]
mod intrusion_detection_tests;
