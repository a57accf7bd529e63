// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deep packet inspection `DaemonSet` builder.

use super::{build_labels, selector_labels, RenderContext};
use crate::components::{resolve_image, COMPONENT_DEEP_PACKET_INSPECTION};
use crate::constants::{DPI_CONTAINER_NAME, DPI_DAEMONSET_NAME, DPI_NAMESPACE};
use crate::errors::ImageError;
use crate::labels::COMPONENT_DPI;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec,
    SecurityContext, Toleration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Build the `vigil-dpi` daemon set.
///
/// Runs on the host network of every node and uses the resolved DPI resource
/// requirements from the `IntrusionDetection` spec.
///
/// # Errors
///
/// Returns an [`ImageError`] if the DPI image cannot be resolved.
pub fn build_dpi_daemonset(ctx: &RenderContext) -> Result<DaemonSet, ImageError> {
    let image = resolve_image(
        &COMPONENT_DEEP_PACKET_INSPECTION,
        &ctx.registry,
        ctx.image_path.as_deref(),
        &ctx.overrides,
    )?;
    let labels = build_labels(DPI_DAEMONSET_NAME, COMPONENT_DPI);

    let container = Container {
        name: DPI_CONTAINER_NAME.to_string(),
        image: Some(image),
        resources: Some(ctx.dpi_resource_requirements.clone()),
        env: Some(vec![EnvVar {
            name: "NODENAME".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "spec.nodeName".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["NET_ADMIN".to_string(), "NET_RAW".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(DaemonSet {
        metadata: ObjectMeta {
            name: Some(DPI_DAEMONSET_NAME.to_string()),
            namespace: Some(DPI_NAMESPACE.to_string()),
            labels: Some(labels.clone()),
            owner_references: Some(ctx.owner_references.clone()),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(DPI_DAEMONSET_NAME)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    host_network: Some(true),
                    dns_policy: Some("ClusterFirstWithHostNet".to_string()),
                    // Inspect traffic on every node, tainted or not.
                    tolerations: Some(vec![Toleration {
                        operator: Some("Exists".to_string()),
                        ..Default::default()
                    }]),
                    image_pull_secrets: (!ctx.pull_secrets.is_empty())
                        .then(|| ctx.pull_secrets.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
