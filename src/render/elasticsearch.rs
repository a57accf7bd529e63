// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Elasticsearch connection settings shared by the rendered workloads.

use super::ClusterRole;
use crate::constants::{
    ES_CLUSTER_CONFIG_MAP, ES_SERVICE_HOST, ES_SERVICE_PORT, GUARDIAN_SERVICE_HOST,
    GUARDIAN_SERVICE_PORT,
};
use crate::errors::PreconditionError;
use k8s_openapi::api::core::v1::ConfigMap;

const KEY_CLUSTER_NAME: &str = "clusterName";
const KEY_REPLICAS: &str = "replicas";
const KEY_SHARDS: &str = "shards";

/// Settings read from the `vigil-secure-elasticsearch` config map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElasticsearchClusterConfig {
    pub cluster_name: String,
    pub replicas: u32,
    pub shards: u32,
}

impl ElasticsearchClusterConfig {
    /// Parse the cluster config map.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::ElasticsearchConfig`] when a key is missing
    /// or a count is not a non-negative integer.
    pub fn from_config_map(config_map: &ConfigMap) -> Result<Self, PreconditionError> {
        let data = config_map.data.as_ref();
        let field = |key: &str| -> Result<&str, PreconditionError> {
            data.and_then(|d| d.get(key))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    PreconditionError::ElasticsearchConfig(format!(
                        "configmap {ES_CLUSTER_CONFIG_MAP} is missing {key}"
                    ))
                })
        };
        let count = |key: &str| -> Result<u32, PreconditionError> {
            field(key)?.parse().map_err(|e| {
                PreconditionError::ElasticsearchConfig(format!(
                    "configmap {ES_CLUSTER_CONFIG_MAP} has invalid {key}: {e}"
                ))
            })
        };

        Ok(Self {
            cluster_name: field(KEY_CLUSTER_NAME)?.to_string(),
            replicas: count(KEY_REPLICAS)?,
            shards: count(KEY_SHARDS)?,
        })
    }
}

/// Host and port workloads use to reach Elasticsearch.
///
/// Managed clusters go through the guardian tunnel to the management cluster.
#[must_use]
pub fn elasticsearch_endpoint(role: ClusterRole, cluster_domain: &str) -> (String, u16) {
    if role.is_managed() {
        (
            format!("{GUARDIAN_SERVICE_HOST}.{cluster_domain}"),
            GUARDIAN_SERVICE_PORT,
        )
    } else {
        (format!("{ES_SERVICE_HOST}.{cluster_domain}"), ES_SERVICE_PORT)
    }
}

#[cfg(test)]
#[path = "elasticsearch_tests.rs"]
mod elasticsearch_tests;
