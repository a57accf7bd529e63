// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `secrets.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::render::{compose, test_context, ClusterRole, DesiredObject};
    use k8s_openapi::api::core::v1::LocalObjectReference;

    fn pull_secret(name: &str) -> Secret {
        let mut secret = Secret::default();
        secret.metadata.name = Some(name.to_string());
        secret.metadata.namespace = Some("vigil-operator".to_string());
        secret.type_ = Some("kubernetes.io/dockerconfigjson".to_string());
        secret
    }

    #[test]
    fn test_copy_keeps_data_and_drops_source_metadata() {
        let ctx = test_context(ClusterRole::Standalone);
        let source = &ctx.secrets[0];

        let namespace = "vigil-intrusion-detection";
        let copy = copy_secret(source, namespace, &ctx.owner_references);
        assert_eq!(copy.metadata.namespace.as_deref(), Some(namespace));
        assert_eq!(copy.metadata.name, source.metadata.name);
        assert!(copy.metadata.resource_version.is_none());
        assert_eq!(copy.data, source.data);
        let owners = copy.metadata.owner_references.unwrap();
        assert_eq!(owners[0].kind, "IntrusionDetection");
        assert_eq!(
            copy.metadata.labels.unwrap()["app.kubernetes.io/component"],
            "credentials"
        );
    }

    #[test]
    fn test_no_copies_into_the_operator_namespace() {
        let mut ctx = test_context(ClusterRole::Standalone);
        ctx.operator_namespace = "vigil-intrusion-detection".to_string();
        assert!(build_workload_secrets(&ctx).is_empty());
        assert!(managed_cluster_obsolete_secrets(&ctx).is_empty());
    }

    #[test]
    fn test_dpi_namespace_gets_pull_secrets_only() {
        let mut ctx = test_context(ClusterRole::Standalone);
        ctx.pull_secrets = vec![LocalObjectReference {
            name: "registry-auth".to_string(),
        }];
        ctx.secrets.insert(0, pull_secret("registry-auth"));

        let copies = build_dpi_secrets(&ctx);
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].namespace().as_deref(), Some("vigil-dpi"));
        let secret_type = copies[0].type_.as_deref();
        assert_eq!(secret_type, Some("kubernetes.io/dockerconfigjson"));

        // The DaemonSet follows its pull secret copy.
        let set = compose(&ctx).unwrap();
        let tail: Vec<String> = set.objects[set.objects.len() - 2..]
            .iter()
            .map(|o| o.object_ref().to_string())
            .collect();
        assert_eq!(
            tail,
            vec!["Secret vigil-dpi/registry-auth", "DaemonSet vigil-dpi/vigil-dpi"]
        );

        ctx.dpi_resources.clear();
        let set = compose(&ctx).unwrap();
        let dpi_copies = set.objects.iter().filter(|o| {
            matches!(o, DesiredObject::Secret(s) if s.namespace().as_deref() == Some("vigil-dpi"))
        });
        assert_eq!(dpi_copies.count(), 0);
        assert_eq!(
            set.obsolete_of(ObjectKind::Secret),
            vec![crate::status::NamespacedName::new("vigil-dpi", "registry-auth")]
        );
    }
}
