// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS key pair lookup.
//!
//! Components that serve TLS mount a `kubernetes.io/tls` secret from the
//! operator namespace. Issuance is handled outside the operator; this module
//! locates the key pair, checks it is usable and hashes the certificate so that
//! rendered pod templates roll when the certificate rotates.

use crate::errors::CertificateError;
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Secret data key holding the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// A provisioned key pair, by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    /// Secret holding the key pair
    pub secret_name: String,
    /// Namespace of the secret
    pub namespace: String,
    /// Hex sha256 of the certificate
    pub hash: String,
}

impl KeyPair {
    /// Annotation key carrying this key pair's hash on a pod template.
    #[must_use]
    pub fn hash_annotation_key(&self) -> String {
        format!(
            "{}{}",
            crate::constants::KEY_PAIR_HASH_ANNOTATION_PREFIX,
            self.secret_name
        )
    }
}

/// Provides TLS key pairs for rendered components.
#[async_trait]
pub trait CertificateManager: Send + Sync {
    /// Return the key pair stored in `secret_name`, provisioning it if the
    /// implementation is able to.
    async fn get_or_create_key_pair(
        &self,
        secret_name: &str,
        namespace: &str,
        dns_names: &[String],
    ) -> Result<KeyPair, CertificateError>;
}

/// [`CertificateManager`] that reads key pairs provisioned into secrets.
pub struct SecretCertificateManager<S> {
    store: S,
}

impl<S> SecretCertificateManager<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

/// Hex-encoded sha256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Validate a TLS secret and build its [`KeyPair`].
///
/// # Errors
///
/// Returns [`CertificateError::Malformed`] when the certificate or key is
/// missing, empty or not PEM.
pub fn key_pair_from_secret(secret: &Secret, namespace: &str) -> Result<KeyPair, CertificateError> {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let malformed = |reason: &str| CertificateError::Malformed {
        secret: secret_name.clone(),
        namespace: namespace.to_string(),
        reason: reason.to_string(),
    };

    let data = secret.data.as_ref().ok_or_else(|| malformed("secret has no data"))?;
    let cert = data
        .get(TLS_CERT_KEY)
        .filter(|c| !c.0.is_empty())
        .ok_or_else(|| malformed("missing tls.crt"))?;
    let key = data
        .get(TLS_PRIVATE_KEY_KEY)
        .filter(|k| !k.0.is_empty())
        .ok_or_else(|| malformed("missing tls.key"))?;

    if !cert.0.starts_with(b"-----BEGIN CERTIFICATE-----") {
        return Err(malformed("tls.crt is not a PEM certificate"));
    }
    if !key.0.starts_with(b"-----BEGIN") {
        return Err(malformed("tls.key is not a PEM private key"));
    }

    Ok(KeyPair {
        secret_name,
        namespace: namespace.to_string(),
        hash: sha256_hex(&cert.0),
    })
}

#[async_trait]
impl<S> CertificateManager for SecretCertificateManager<S>
where
    S: ObjectStore,
{
    async fn get_or_create_key_pair(
        &self,
        secret_name: &str,
        namespace: &str,
        dns_names: &[String],
    ) -> Result<KeyPair, CertificateError> {
        let secret: Secret = match self.store.get(Some(namespace), secret_name).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                return Err(CertificateError::NotProvisioned {
                    secret: secret_name.to_string(),
                    namespace: namespace.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let key_pair = key_pair_from_secret(&secret, namespace)?;
        debug!(
            secret = %secret_name,
            namespace = %namespace,
            hash = %key_pair.hash,
            dns_names = ?dns_names,
            "Found TLS key pair"
        );
        Ok(key_pair)
    }
}

/// Names the rendered services answer to inside the cluster.
#[must_use]
pub fn service_dns_names(service: &str, namespace: &str, cluster_domain: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
        format!("{service}.{namespace}.svc.{cluster_domain}"),
    ]
}

#[cfg(test)]
#[path = "certificates_tests.rs"]
mod certificates_tests;
