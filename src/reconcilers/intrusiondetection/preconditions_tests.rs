// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `preconditions.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::certificates::SecretCertificateManager;
    use crate::constants::DEFAULT_OPERATOR_NAMESPACE;
    use crate::crd::{
        ImageDigest, ImageSetSpec, InstallationStatus, IntrusionDetectionComponentResource,
    };
    use crate::errors::{CertificateError, ImageError, StoreError};
    use crate::reconcilers::intrusiondetection::test_fixtures::{
        license, seed_ready_cluster, secret,
    };
    use crate::store::{MemoryStore, Operation};
    use k8s_openapi::api::core::v1::ResourceRequirements;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::sync::Arc;

    struct Harness {
        store: Arc<MemoryStore>,
        certs: SecretCertificateManager<Arc<MemoryStore>>,
        config: ReconcilerConfig,
    }

    impl Harness {
        fn new(role: ClusterRole) -> Self {
            let store = Arc::new(MemoryStore::new());
            seed_ready_cluster(&store, role);
            Self {
                certs: SecretCertificateManager::new(Arc::clone(&store)),
                store,
                config: ReconcilerConfig::default(),
            }
        }

        async fn resolve(&self) -> Result<Resolution, PreconditionError> {
            let instance: IntrusionDetection = self
                .store
                .peek(None, DEFAULT_INSTANCE_NAME)
                .unwrap();
            resolve(&self.store, &self.certs, &self.config, &instance).await
        }

        async fn ready(&self) -> RenderContext {
            match self.resolve().await.unwrap() {
                Resolution::Ready(ctx) => *ctx,
                other => panic!("expected a render context, got {other:?}"),
            }
        }
    }

    fn secret_names(ctx: &RenderContext) -> Vec<String> {
        ctx.secrets.iter().map(ResourceExt::name_any).collect()
    }

    fn deferred(resolution: Resolution) -> (String, String, Duration) {
        match resolution {
            Resolution::Deferred {
                reason,
                message,
                requeue,
            } => (reason, message, requeue),
            other => panic!("expected deferral, got {other:?}"),
        }
    }

    #[test]
    fn test_readiness_gates_in_order() {
        let license_api = ReadyFlag::new("LicenseKeyAPI");
        let dpi_api = ReadyFlag::new("DeepPacketInspectionAPI");

        let (reason, message, requeue) = deferred(check_readiness(&license_api, &dpi_api).unwrap());
        assert_eq!(reason, "Waiting for LicenseKeyAPI to be ready");
        assert!(message.is_empty());
        assert_eq!(requeue, Duration::from_secs(10));

        license_api.mark_ready();
        let (reason, _, _) = deferred(check_readiness(&license_api, &dpi_api).unwrap());
        assert_eq!(reason, "Waiting for DeepPacketInspectionAPI to be ready");

        dpi_api.mark_ready();
        assert!(check_readiness(&license_api, &dpi_api).is_none());
    }

    #[tokio::test]
    async fn test_standalone_resolves() {
        let harness = Harness::new(ClusterRole::Standalone);
        let ctx = harness.ready().await;

        assert_eq!(ctx.role, ClusterRole::Standalone);
        assert_eq!(ctx.registry, "quay.io/");
        assert!(ctx.mount_es_public_cert);
        assert!(ctx.overrides.is_empty());
        assert!(ctx.dpi_resources.is_empty());
        assert_eq!(ctx.dpi_resource_requirements, default_dpi_requirements());
        assert_eq!(ctx.elasticsearch.shards, 5);
        assert_eq!(ctx.controller_key_pair.hash.len(), 64);
        assert_ne!(ctx.controller_key_pair.hash, ctx.ad_api_key_pair.hash);
        assert_eq!(ctx.owner_references[0].name, "default");
        assert_eq!(ctx.operator_namespace, DEFAULT_OPERATOR_NAMESPACE);
        assert_eq!(
            secret_names(&ctx),
            vec![
                ES_INSTALLER_ACCESS_SECRET,
                ES_INTRUSION_DETECTION_USER_SECRET,
                ES_AD_JOB_USER_SECRET,
                ES_PUBLIC_CERT_SECRET,
                INTRUSION_DETECTION_TLS_SECRET,
                AD_API_TLS_SECRET,
            ]
        );
    }

    #[tokio::test]
    async fn test_pull_secrets_are_carried_once() {
        let harness = Harness::new(ClusterRole::Standalone);
        let mut installation: Installation = harness.store.peek(None, "default").unwrap();
        // Listing the same secret twice, or naming an access secret, copies it once.
        installation.spec.image_pull_secrets = Some(
            ["registry-auth", "registry-auth", ES_AD_JOB_USER_SECRET]
                .into_iter()
                .map(|name| LocalObjectReference {
                    name: name.to_string(),
                })
                .collect(),
        );
        harness.store.seed(installation).unwrap();
        harness
            .store
            .seed(secret(DEFAULT_OPERATOR_NAMESPACE, "registry-auth"))
            .unwrap();

        let ctx = harness.ready().await;
        let names = secret_names(&ctx);
        assert_eq!(names[0], "registry-auth");
        assert_eq!(names.len(), 7);
        assert_eq!(
            names.iter().filter(|n| *n == ES_AD_JOB_USER_SECRET).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_installation_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.remove::<Installation>(None, "default");

        let err = harness.resolve().await.unwrap_err();
        assert!(matches!(err, PreconditionError::InstallationNotFound { .. }));
        assert_eq!(err.degraded_reason(), "Error querying installation");
    }

    #[tokio::test]
    async fn test_community_installation_is_deferred() {
        let harness = Harness::new(ClusterRole::Standalone);
        let mut installation: Installation = harness.store.peek(None, "default").unwrap();
        installation.spec.variant = Some(ProductVariant::Community);
        harness.store.seed(installation).unwrap();

        let (reason, _, requeue) = deferred(harness.resolve().await.unwrap());
        assert_eq!(reason, "Waiting for enterprise installation");
        assert_eq!(requeue, DEFERRED_REQUEUE);
    }

    #[tokio::test]
    async fn test_variant_falls_back_to_status() {
        let harness = Harness::new(ClusterRole::Standalone);
        let mut installation: Installation = harness.store.peek(None, "default").unwrap();
        installation.spec.variant = None;
        installation.status = Some(InstallationStatus {
            variant: Some(ProductVariant::Enterprise),
            computed: None,
        });
        harness.store.seed(installation).unwrap();

        harness.ready().await;
    }

    #[tokio::test]
    async fn test_missing_pull_secret_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        let mut installation: Installation = harness.store.peek(None, "default").unwrap();
        installation.spec.image_pull_secrets = Some(vec![
            LocalObjectReference {
                name: "present".to_string(),
            },
            LocalObjectReference {
                name: "absent".to_string(),
            },
        ]);
        harness.store.seed(installation).unwrap();
        harness
            .store
            .seed(secret(DEFAULT_OPERATOR_NAMESPACE, "present"))
            .unwrap();

        let err = harness.resolve().await.unwrap_err();
        assert_eq!(
            err,
            PreconditionError::PullSecretsMissing {
                namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
                missing: vec!["absent".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_image_set_overrides_are_loaded() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness
            .store
            .seed(ImageSet::new(
                &image_set_name(),
                ImageSetSpec {
                    images: vec![ImageDigest {
                        image: "vigil/intrusion-detection-controller".to_string(),
                        digest: "sha256:abcd".to_string(),
                    }],
                },
            ))
            .unwrap();

        let ctx = harness.ready().await;
        assert_eq!(
            ctx.overrides.digest_for("vigil/intrusion-detection-controller"),
            Some("sha256:abcd")
        );
    }

    #[tokio::test]
    async fn test_invalid_image_set_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness
            .store
            .seed(ImageSet::new(
                &image_set_name(),
                ImageSetSpec {
                    images: vec![ImageDigest {
                        image: "vigil/intrusion-detection-controller".to_string(),
                        digest: "latest".to_string(),
                    }],
                },
            ))
            .unwrap();

        let err = harness.resolve().await.unwrap_err();
        assert!(matches!(
            err,
            PreconditionError::Image(ImageError::InvalidImageSet { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_license_is_deferred() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.remove::<LicenseKey>(None, "default");

        let (reason, message, requeue) = deferred(harness.resolve().await.unwrap());
        assert_eq!(reason, "License not found");
        assert_eq!(message, "licensekeys \"default\" not found");
        assert_eq!(requeue, DEFERRED_REQUEUE);
    }

    #[tokio::test]
    async fn test_license_read_failure_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.fail_on::<LicenseKey>(
            Operation::Get,
            "default",
            StoreError::Api {
                operation: "get".to_string(),
                resource: "licensekeys".to_string(),
                name: "default".to_string(),
                message: "connection refused".to_string(),
            },
        );

        let err = harness.resolve().await.unwrap_err();
        assert!(matches!(err, PreconditionError::License(_)));
    }

    #[tokio::test]
    async fn test_feature_not_licensed() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.seed(license(&["egress-access-control"])).unwrap();

        match harness.resolve().await.unwrap() {
            Resolution::Unlicensed { reason, message } => {
                assert_eq!(reason, "Feature is not active");
                assert_eq!(message, "License does not support this feature");
            }
            other => panic!("expected unlicensed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_server_not_ready_is_deferred() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.remove::<APIServer>(None, "vigil-secure");

        let (reason, message, _) = deferred(harness.resolve().await.unwrap());
        assert_eq!(reason, "Waiting for Vigil API server to be ready");
        assert_eq!(message, "apiservers \"vigil-secure\" not found");
    }

    #[tokio::test]
    async fn test_conflicting_topology_is_fatal() {
        let harness = Harness::new(ClusterRole::ManagementCluster);
        harness
            .store
            .seed(ManagementClusterConnection::new(
                "vigil-secure",
                Default::default(),
            ))
            .unwrap();

        assert_eq!(
            harness.resolve().await.unwrap_err(),
            PreconditionError::ConflictingTopology
        );
    }

    #[tokio::test]
    async fn test_missing_access_secrets_are_aggregated() {
        let harness = Harness::new(ClusterRole::ManagementCluster);
        harness
            .store
            .remove::<Secret>(Some(DEFAULT_OPERATOR_NAMESPACE), ES_INSTALLER_ACCESS_SECRET);
        harness
            .store
            .remove::<Secret>(Some(DEFAULT_OPERATOR_NAMESPACE), ES_AD_JOB_USER_SECRET);

        let (reason, message, requeue) = deferred(harness.resolve().await.unwrap());
        assert_eq!(
            reason,
            "Elasticsearch secrets are not available yet, waiting until they become available"
        );
        assert_eq!(
            message,
            "secrets \"vigil-ee-installer-elasticsearch-access\", \"vigil-ee-ad-job-elasticsearch-access\" not found"
        );
        assert_eq!(requeue, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_managed_cluster_needs_no_installer_secret_or_cert() {
        let harness = Harness::new(ClusterRole::ManagedCluster);
        harness
            .store
            .remove::<Secret>(Some(DEFAULT_OPERATOR_NAMESPACE), ES_PUBLIC_CERT_SECRET);

        let ctx = harness.ready().await;
        assert_eq!(ctx.role, ClusterRole::ManagedCluster);
        assert!(!ctx.mount_es_public_cert);
        let names = secret_names(&ctx);
        assert!(!names.iter().any(|n| n == ES_INSTALLER_ACCESS_SECRET));
        assert!(!names.iter().any(|n| n == ES_PUBLIC_CERT_SECRET));
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_required_access_secrets() {
        assert_eq!(required_access_secrets(ClusterRole::Standalone).len(), 3);
        assert_eq!(required_access_secrets(ClusterRole::ManagementCluster).len(), 3);
        assert_eq!(
            required_access_secrets(ClusterRole::ManagedCluster),
            vec![ES_INTRUSION_DETECTION_USER_SECRET, ES_AD_JOB_USER_SECRET]
        );
    }

    #[tokio::test]
    async fn test_missing_es_config_map_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness
            .store
            .remove::<ConfigMap>(Some(DEFAULT_OPERATOR_NAMESPACE), ES_CLUSTER_CONFIG_MAP);

        let err = harness.resolve().await.unwrap_err();
        assert_eq!(err.degraded_reason(), "Failed to get Elasticsearch configuration");
    }

    #[tokio::test]
    async fn test_missing_es_public_cert_is_fatal_outside_managed_clusters() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness
            .store
            .remove::<Secret>(Some(DEFAULT_OPERATOR_NAMESPACE), ES_PUBLIC_CERT_SECRET);

        let err = harness.resolve().await.unwrap_err();
        assert!(err.to_string().contains(ES_PUBLIC_CERT_SECRET));
    }

    #[tokio::test]
    async fn test_missing_key_pair_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness
            .store
            .remove::<Secret>(Some(DEFAULT_OPERATOR_NAMESPACE), AD_API_TLS_SECRET);

        let err = harness.resolve().await.unwrap_err();
        assert!(matches!(
            err,
            PreconditionError::KeyPair(CertificateError::NotProvisioned { .. })
        ));
        assert_eq!(err.degraded_reason(), "Error creating TLS certificate");
    }

    #[tokio::test]
    async fn test_dpi_resources_and_requirements() {
        let harness = Harness::new(ClusterRole::Standalone);
        let mut dpi = DeepPacketInspection::new("inspect-frontend", Default::default());
        dpi.metadata.namespace = Some("shop".to_string());
        harness.store.seed(dpi).unwrap();

        let custom = ResourceRequirements {
            requests: Some(
                [("cpu".to_string(), Quantity("250m".to_string()))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        let mut instance: IntrusionDetection = harness.store.peek(None, "default").unwrap();
        instance.spec.component_resources = Some(vec![IntrusionDetectionComponentResource {
            component_name: ComponentName::DeepPacketInspection,
            resource_requirements: Some(custom.clone()),
        }]);
        harness.store.seed(instance).unwrap();

        let ctx = harness.ready().await;
        assert_eq!(
            ctx.dpi_resources,
            vec![NamespacedName::new("shop", "inspect-frontend")]
        );
        assert_eq!(ctx.dpi_resource_requirements, custom);
    }

    #[tokio::test]
    async fn test_dpi_list_failure_is_fatal() {
        let harness = Harness::new(ClusterRole::Standalone);
        harness.store.fail_on::<DeepPacketInspection>(
            Operation::List,
            "",
            StoreError::Api {
                operation: "list".to_string(),
                resource: "deeppacketinspections".to_string(),
                name: String::new(),
                message: "forbidden".to_string(),
            },
        );

        let err = harness.resolve().await.unwrap_err();
        assert!(matches!(err, PreconditionError::DpiList(_)));
    }
}
