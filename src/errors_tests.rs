// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;
    use crate::status_reasons::{DEGRADED_APPLY, DEGRADED_IMAGE_SET, DEGRADED_KEY_PAIR};

    #[test]
    fn test_not_found_message_matches_kubectl() {
        let err = StoreError::NotFound {
            resource: "secrets".to_string(),
            name: "vigil-ee-installer-elasticsearch-access".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "secrets \"vigil-ee-installer-elasticsearch-access\" not found"
        );
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_error() {
        let err = StoreError::Conflict {
            resource: "deployments".to_string(),
            name: "anomaly-detection-api".to_string(),
            message: "the object has been modified".to_string(),
        };
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "operation cannot be fulfilled on deployments \"anomaly-detection-api\": the object has been modified"
        );
    }

    #[test]
    fn test_pull_secrets_message_lists_all() {
        let err = PreconditionError::PullSecretsMissing {
            namespace: "vigil-operator".to_string(),
            missing: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "pull secrets not found in namespace vigil-operator: a, b"
        );
    }

    #[test]
    fn test_degraded_reason_mapping() {
        let image = PreconditionError::from(ImageError::InvalidImageSet {
            name: "enterprise-v3.14.0".to_string(),
            reason: "bad digest".to_string(),
        });
        assert_eq!(image.degraded_reason(), DEGRADED_IMAGE_SET);

        let cert = PreconditionError::from(CertificateError::NotProvisioned {
            secret: "intrusion-detection-tls".to_string(),
            namespace: "vigil-operator".to_string(),
        });
        assert_eq!(cert.degraded_reason(), DEGRADED_KEY_PAIR);

        let apply = ReconcileError::Apply {
            failed: 1,
            attempted: 5,
            first: "boom".to_string(),
        };
        assert_eq!(apply.degraded_reason(), DEGRADED_APPLY);
        assert_eq!(apply.metric_label(), "apply");
    }

    #[test]
    fn test_reconcile_error_is_transparent_for_preconditions() {
        let err = ReconcileError::from(PreconditionError::ConflictingTopology);
        assert_eq!(
            err.to_string(),
            "a cluster cannot be both a management cluster and a managed cluster"
        );
    }
}
