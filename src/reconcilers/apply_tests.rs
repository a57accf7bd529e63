// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `apply.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::render::{compose, test_context, ClusterRole};
    use crate::store::{MemoryStore, ObjectStore, Operation};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{PodTemplate, Secret};
    use serde_json::json;

    #[test]
    fn test_is_subset() {
        let live = json!({"a": 1, "b": {"c": [1, {"d": 2, "e": 3}]}, "f": "x"});
        assert!(is_subset(&json!({"a": 1}), &live));
        assert!(is_subset(&json!({"b": {"c": [1, {"d": 2}]}}), &live));
        assert!(!is_subset(&json!({"b": {"c": [1]}}), &live));
        assert!(!is_subset(&json!({"a": 2}), &live));
        assert!(!is_subset(&json!({"missing": true}), &live));
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let store = MemoryStore::new();
        let set = compose(&test_context(ClusterRole::Standalone)).unwrap();

        let first = apply_object_set(&store, &set).await;
        assert_eq!(first.created.len(), 12);
        assert!(first.is_success());

        store.reset_calls();
        let second = apply_object_set(&store, &set).await;
        assert_eq!(second.unchanged.len(), 12);
        assert_eq!(store.total_calls(Operation::Create), 0);
        assert_eq!(store.total_calls(Operation::Update), 0);
    }

    #[tokio::test]
    async fn test_changed_object_is_updated_keeping_foreign_labels() {
        let store = MemoryStore::new();
        let mut ctx = test_context(ClusterRole::Standalone);
        let set = compose(&ctx).unwrap();
        apply_object_set(&store, &set).await;

        // Someone else labels the live deployment.
        let mut live: Deployment = store
            .get(Some("vigil-intrusion-detection"), "anomaly-detection-api")
            .await
            .unwrap();
        live.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".to_string(), "security".to_string());
        store.update(&live).await.unwrap();

        ctx.ad_api_key_pair.hash = "rotated".to_string();
        let report = apply_object_set(&store, &compose(&ctx).unwrap()).await;
        assert_eq!(report.updated.len(), 1);
        assert!(report.created.is_empty());

        let updated: Deployment = store
            .get(Some("vigil-intrusion-detection"), "anomaly-detection-api")
            .await
            .unwrap();
        assert_eq!(updated.metadata.labels.unwrap()["team"], "security");
    }

    #[tokio::test]
    async fn test_create_conflict_falls_back_to_compare() {
        let store = MemoryStore::new();
        let set = compose(&test_context(ClusterRole::Standalone)).unwrap();
        apply_object_set(&store, &set).await;

        let Some(DesiredObject::PodTemplate(template)) = set
            .objects
            .iter()
            .find(|o| o.object_ref().name == "vigil.io.detectors.training")
        else {
            panic!("expected the training pod template");
        };
        // Get reports absent, create then races with the existing object.
        store.fail_on::<PodTemplate>(
            Operation::Get,
            "vigil.io.detectors.training",
            StoreError::NotFound {
                resource: "podtemplates".to_string(),
                name: "vigil.io.detectors.training".to_string(),
            },
        );
        let err = create_or_update(&store, template).await.unwrap_err();
        // The re-get hits the same injected failure.
        assert!(err.is_not_found());

        store.clear_failures();
        assert_eq!(
            create_or_update(&store, template).await.unwrap(),
            ApplyOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let store = MemoryStore::new();
        store.fail_on::<PodTemplate>(
            Operation::Create,
            "vigil.io.detectors.training",
            StoreError::Api {
                operation: "create".to_string(),
                resource: "podtemplates".to_string(),
                name: "vigil.io.detectors.training".to_string(),
                message: "admission webhook denied the request".to_string(),
            },
        );

        let set = compose(&test_context(ClusterRole::Standalone)).unwrap();
        let report = apply_object_set(&store, &set).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.created.len(), 11);
        assert_eq!(store.count_objects::<Deployment>(), 2);

        let err = report.to_error().unwrap();
        assert!(err.to_string().starts_with("1 of 12 objects failed to apply"));
    }

    #[tokio::test]
    async fn test_obsolete_objects_are_deleted_once() {
        let store = MemoryStore::new();
        let set = compose(&test_context(ClusterRole::Standalone)).unwrap();
        apply_object_set(&store, &set).await;

        let managed = compose(&test_context(ClusterRole::ManagedCluster)).unwrap();
        let report = apply_object_set(&store, &managed).await;
        // The installer job and the secret copies only it used.
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(store.count_objects::<Job>(), 0);
        assert_eq!(store.count_objects::<Secret>(), 4);

        let again = apply_object_set(&store, &managed).await;
        assert!(again.deleted.is_empty());
        assert!(again.is_success());
    }

    fn installer_job(set: &DesiredObjectSet) -> Job {
        set.objects
            .iter()
            .find_map(|o| match o {
                DesiredObject::Job(job) => Some(job.clone()),
                _ => None,
            })
            .expect("standalone clusters run the installer")
    }

    fn container_image(job: &Job) -> Option<String> {
        job.spec.as_ref()?.template.spec.as_ref()?.containers[0]
            .image
            .clone()
    }

    #[tokio::test]
    async fn test_changed_job_template_is_recreated() {
        let store = MemoryStore::new();
        let set = compose(&test_context(ClusterRole::Standalone)).unwrap();
        apply_object_set(&store, &set).await;

        let mut job = installer_job(&set);
        let pod = job.spec.as_mut().and_then(|s| s.template.spec.as_mut());
        if let Some(pod) = pod {
            pod.containers[0].image = Some("registry.example.org/installer:v2".to_string());
        }

        store.reset_calls();
        assert_eq!(
            create_or_recreate(&store, &job).await.unwrap(),
            ApplyOutcome::Recreated
        );
        assert_eq!(store.calls::<Job>(Operation::Update), 0);
        assert_eq!(store.calls::<Job>(Operation::Delete), 1);
        assert_eq!(store.calls::<Job>(Operation::Create), 1);

        let live: Job = store
            .peek(
                Some("vigil-intrusion-detection"),
                "intrusion-detection-es-job-installer",
            )
            .unwrap();
        assert_eq!(
            container_image(&live).as_deref(),
            Some("registry.example.org/installer:v2")
        );

        // A matching job is left alone.
        assert_eq!(
            create_or_recreate(&store, &job).await.unwrap(),
            ApplyOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_registry_change_heals_the_installer_job() {
        let store = MemoryStore::new();
        let mut ctx = test_context(ClusterRole::Standalone);
        apply_object_set(&store, &compose(&ctx).unwrap()).await;

        ctx.registry = "registry.example.org/".to_string();
        let set = compose(&ctx).unwrap();
        let report = apply_object_set(&store, &set).await;
        assert!(report.is_success());
        assert!(report.updated.contains(&ObjectRef::new(
            ObjectKind::Job,
            "vigil-intrusion-detection",
            "intrusion-detection-es-job-installer"
        )));

        let live: Job = store
            .peek(
                Some("vigil-intrusion-detection"),
                "intrusion-detection-es-job-installer",
            )
            .unwrap();
        assert_eq!(container_image(&live), container_image(&installer_job(&set)));
    }
}
