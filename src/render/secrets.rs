// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Copies of operator namespace secrets.
//!
//! Pods can only mount secrets and read `secretKeyRef`s from their own
//! namespace. Every secret a rendered pod references is read from the operator
//! namespace and copied, owner-referenced, into the namespace the pod runs in.

use super::{build_labels, ObjectKind, ObjectRef, RenderContext};
use crate::constants::{
    DPI_NAMESPACE, ES_INSTALLER_ACCESS_SECRET, ES_PUBLIC_CERT_SECRET,
    INTRUSION_DETECTION_NAMESPACE,
};
use crate::labels::COMPONENT_CREDENTIALS;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;

/// Copy `source` into `namespace`, keeping only its type and data.
#[must_use]
pub fn copy_secret(
    source: &Secret,
    namespace: &str,
    owner_references: &[OwnerReference],
) -> Secret {
    let name = source.name_any();
    Secret {
        metadata: ObjectMeta {
            labels: Some(build_labels(&name, COMPONENT_CREDENTIALS)),
            name: Some(name),
            namespace: Some(namespace.to_string()),
            owner_references: Some(owner_references.to_vec()),
            ..Default::default()
        },
        type_: source.type_.clone(),
        data: source.data.clone(),
        ..Default::default()
    }
}

fn copies_into<'a>(
    ctx: &RenderContext,
    namespace: &str,
    sources: impl Iterator<Item = &'a Secret>,
) -> Vec<Secret> {
    // Copying into the namespace the secret already lives in would overwrite it.
    if namespace == ctx.operator_namespace {
        return Vec::new();
    }
    sources
        .map(|source| copy_secret(source, namespace, &ctx.owner_references))
        .collect()
}

fn is_pull_secret(ctx: &RenderContext, secret: &Secret) -> bool {
    let name = secret.name_any();
    ctx.pull_secrets.iter().any(|reference| reference.name == name)
}

/// Every referenced secret, copied into the intrusion detection namespace.
#[must_use]
pub fn build_workload_secrets(ctx: &RenderContext) -> Vec<Secret> {
    copies_into(ctx, INTRUSION_DETECTION_NAMESPACE, ctx.secrets.iter())
}

/// Pull secrets, copied into the deep packet inspection namespace.
#[must_use]
pub fn build_dpi_secrets(ctx: &RenderContext) -> Vec<Secret> {
    copies_into(
        ctx,
        DPI_NAMESPACE,
        ctx.secrets.iter().filter(|s| is_pull_secret(ctx, s)),
    )
}

/// Copies a managed cluster no longer uses.
#[must_use]
pub fn managed_cluster_obsolete_secrets(ctx: &RenderContext) -> Vec<ObjectRef> {
    if ctx.operator_namespace == INTRUSION_DETECTION_NAMESPACE {
        return Vec::new();
    }
    [ES_INSTALLER_ACCESS_SECRET, ES_PUBLIC_CERT_SECRET]
        .into_iter()
        .map(|name| ObjectRef::new(ObjectKind::Secret, INTRUSION_DETECTION_NAMESPACE, name))
        .collect()
}

/// Pull secret copies left behind once the DPI daemon set is gone.
#[must_use]
pub fn dpi_obsolete_secrets(ctx: &RenderContext) -> Vec<ObjectRef> {
    if ctx.operator_namespace == DPI_NAMESPACE {
        return Vec::new();
    }
    ctx.pull_secrets
        .iter()
        .map(|reference| ObjectRef::new(ObjectKind::Secret, DPI_NAMESPACE, &reference.name))
        .collect()
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
