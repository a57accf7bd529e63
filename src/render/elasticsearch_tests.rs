// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `elasticsearch.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::render::ClusterRole;
    use std::collections::BTreeMap;

    fn config_map(entries: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_cluster_config() {
        let cm = config_map(&[("clusterName", "cluster"), ("replicas", "1"), ("shards", "5")]);
        let config = ElasticsearchClusterConfig::from_config_map(&cm).unwrap();
        assert_eq!(config.cluster_name, "cluster");
        assert_eq!(config.replicas, 1);
        assert_eq!(config.shards, 5);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let cm = config_map(&[("clusterName", "cluster"), ("replicas", "1")]);
        let err = ElasticsearchClusterConfig::from_config_map(&cm).unwrap_err();
        assert!(err.to_string().contains("missing shards"));
    }

    #[test]
    fn test_invalid_count_is_reported() {
        let cm = config_map(&[("clusterName", "c"), ("replicas", "-1"), ("shards", "1")]);
        let err = ElasticsearchClusterConfig::from_config_map(&cm).unwrap_err();
        assert!(err.to_string().contains("invalid replicas"));
    }

    #[test]
    fn test_endpoint_by_role() {
        let local = (
            "vigil-secure-es-http.vigil-elasticsearch.svc.cluster.local".to_string(),
            9200,
        );
        assert_eq!(
            elasticsearch_endpoint(ClusterRole::Standalone, "cluster.local"),
            local
        );
        assert_eq!(
            elasticsearch_endpoint(ClusterRole::ManagementCluster, "cluster.local"),
            local
        );
        assert_eq!(
            elasticsearch_endpoint(ClusterRole::ManagedCluster, "example.org"),
            ("vigil-guardian.vigil-guardian.svc.example.org".to_string(), 443)
        );
    }
}
