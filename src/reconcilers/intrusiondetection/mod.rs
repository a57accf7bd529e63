// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `IntrusionDetection` reconciliation.
//!
//! A pass moves through these stages, stopping at the first one that cannot
//! complete:
//!
//! 1. **Gating** - both dependent APIs must be served
//! 2. **Defaults** - missing component resources are written back to the CR
//! 3. **Resolving** - every cluster input is gathered ([`preconditions`])
//! 4. **Composing** - the desired objects are rendered ([`crate::render`])
//! 5. **Applying** - objects are created, updated or deleted ([`crate::reconcilers::apply`])
//!
//! Every pass ends in one of three places: healthy (degraded cleared),
//! deferred (degraded reported, requeued without error) or failed (degraded
//! reported, error returned so the controller backs off).

use crate::certificates::CertificateManager;
use crate::config::ReconcilerConfig;
use crate::constants::{DEFAULT_INSTANCE_NAME, UNAVAILABLE_REQUEUE};
use crate::crd::IntrusionDetection;
use crate::errors::{PreconditionError, ReconcileError};
use crate::readiness::ReadyFlag;
use crate::reconcilers::apply::apply_object_set;
use crate::render::{compose, compose_teardown, DesiredObjectSet, ObjectKind};
use crate::status::StatusSink;
use crate::store::{get_optional, ObjectStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod defaults;
pub mod preconditions;

pub use defaults::{default_dpi_requirements, fill_defaults};
pub use preconditions::{check_readiness, resolve, Resolution};

/// Reconciles the `default` `IntrusionDetection` instance.
///
/// Shared across passes behind an `Arc`; holds no per-pass state.
pub struct Reconciler<S> {
    store: S,
    status: Arc<dyn StatusSink>,
    certs: Arc<dyn CertificateManager>,
    license_api_ready: Arc<ReadyFlag>,
    dpi_api_ready: Arc<ReadyFlag>,
    config: ReconcilerConfig,
}

impl<S: ObjectStore> Reconciler<S> {
    #[must_use]
    pub fn new(
        store: S,
        status: Arc<dyn StatusSink>,
        certs: Arc<dyn CertificateManager>,
        license_api_ready: Arc<ReadyFlag>,
        dpi_api_ready: Arc<ReadyFlag>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            status,
            certs,
            license_api_ready,
            dpi_api_ready,
            config,
        }
    }

    /// Run one reconcile pass.
    ///
    /// Returns how long to wait before the next pass; zero means only re-run
    /// on a watch event.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`] when a precondition is fatally missing, the
    /// defaults cannot be written, or any object fails to apply. The degraded
    /// status has already been reported when this returns.
    pub async fn reconcile(&self) -> Result<Duration, ReconcileError> {
        let instance = match get_optional::<IntrusionDetection, _>(
            &self.store,
            None,
            DEFAULT_INSTANCE_NAME,
        )
        .await
        {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                debug!("IntrusionDetection {DEFAULT_INSTANCE_NAME} not found, nothing to do");
                return Ok(Duration::ZERO);
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        info!(
            generation = ?instance.metadata.generation,
            "Reconciling IntrusionDetection {DEFAULT_INSTANCE_NAME}"
        );

        if let Some(resolution) = check_readiness(&self.license_api_ready, &self.dpi_api_ready) {
            return self.settle(resolution).await;
        }

        let instance = self.write_defaults(instance).await?;

        let ctx = match resolve(&self.store, self.certs.as_ref(), &self.config, &instance).await {
            Ok(Resolution::Ready(ctx)) => ctx,
            Ok(resolution) => return self.settle(resolution).await,
            Err(e) => return Err(self.fail(e.into())),
        };

        let set = compose(&ctx).map_err(|e| self.fail(PreconditionError::Image(e).into()))?;
        self.apply(&set).await?;

        self.status.clear_degraded();
        if self.status.is_available() {
            info!("IntrusionDetection reconciled");
            Ok(Duration::ZERO)
        } else {
            debug!(
                requeue_secs = UNAVAILABLE_REQUEUE.as_secs(),
                "Workloads still rolling out"
            );
            Ok(UNAVAILABLE_REQUEUE)
        }
    }

    /// Report `err` as the degraded pair and hand it back.
    fn fail(&self, err: ReconcileError) -> ReconcileError {
        warn!(reason = err.degraded_reason(), error = %err, "Reconcile failed");
        self.status.set_degraded(err.degraded_reason(), &err.to_string());
        err
    }

    /// Persist default component resources when any were missing.
    async fn write_defaults(
        &self,
        mut instance: IntrusionDetection,
    ) -> Result<IntrusionDetection, ReconcileError> {
        if !fill_defaults(&mut instance) {
            return Ok(instance);
        }

        info!("Writing default component resources to IntrusionDetection {DEFAULT_INSTANCE_NAME}");
        self.store
            .update(&instance)
            .await
            .map_err(|e| self.fail(ReconcileError::Defaults(e)))
    }

    /// Finish a pass that stopped short of rendering.
    async fn settle(&self, resolution: Resolution) -> Result<Duration, ReconcileError> {
        match resolution {
            Resolution::Deferred {
                reason,
                message,
                requeue,
            } => {
                info!(reason = %reason, message = %message, "Deferring IntrusionDetection");
                self.status.set_degraded(&reason, &message);
                Ok(requeue)
            }
            Resolution::Unlicensed { reason, message } => {
                info!("Intrusion detection is not licensed, removing its workloads");
                self.status.set_degraded(&reason, &message);
                self.apply(&compose_teardown()).await?;
                Ok(Duration::ZERO)
            }
            Resolution::Ready(_) => Ok(Duration::ZERO),
        }
    }

    /// Apply `set` and keep the status sink's workload list in step with it.
    async fn apply(&self, set: &DesiredObjectSet) -> Result<(), ReconcileError> {
        let report = apply_object_set(&self.store, set).await;

        self.status
            .add_deployments(&set.refs_of(ObjectKind::Deployment));
        self.status
            .add_daemonsets(&set.refs_of(ObjectKind::DaemonSet));
        self.status
            .remove_deployments(&set.obsolete_of(ObjectKind::Deployment));
        self.status
            .remove_daemonsets(&set.obsolete_of(ObjectKind::DaemonSet));

        match report.to_error() {
            Some(err) => Err(self.fail(err)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures;
