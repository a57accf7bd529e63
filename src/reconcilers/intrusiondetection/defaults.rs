// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Default component resource requirements.
//!
//! Defaults are written back to the `IntrusionDetection` resource so users can
//! see (and edit) what the operator applied.

use crate::constants::{
    DPI_DEFAULT_CPU_LIMIT, DPI_DEFAULT_CPU_REQUEST, DPI_DEFAULT_MEMORY_LIMIT,
    DPI_DEFAULT_MEMORY_REQUEST,
};
use crate::crd::{ComponentName, IntrusionDetection, IntrusionDetectionComponentResource};
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}

/// Requests and limits used for the DPI daemon set when none are declared.
#[must_use]
pub fn default_dpi_requirements() -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(quantities(DPI_DEFAULT_CPU_REQUEST, DPI_DEFAULT_MEMORY_REQUEST)),
        limits: Some(quantities(DPI_DEFAULT_CPU_LIMIT, DPI_DEFAULT_MEMORY_LIMIT)),
        ..Default::default()
    }
}

/// Fill in missing component resource requirements.
///
/// Entries the user declared with requirements are left alone. An entry for
/// the component without requirements gets the defaults in place; a missing
/// entry is appended. Returns whether `spec` changed.
pub fn fill_defaults(instance: &mut IntrusionDetection) -> bool {
    let resources = instance.spec.component_resources.get_or_insert_with(Vec::new);

    match resources
        .iter_mut()
        .find(|r| r.component_name == ComponentName::DeepPacketInspection)
    {
        Some(entry) if entry.resource_requirements.is_some() => false,
        Some(entry) => {
            entry.resource_requirements = Some(default_dpi_requirements());
            true
        }
        None => {
            resources.push(IntrusionDetectionComponentResource {
                component_name: ComponentName::DeepPacketInspection,
                resource_requirements: Some(default_dpi_requirements()),
            });
            true
        }
    }
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod defaults_tests;
