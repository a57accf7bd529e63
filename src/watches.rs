// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Background probes that latch the API readiness flags.
//!
//! The `LicenseKey` and `DeepPacketInspection` kinds are served by the
//! aggregated API server and CRDs that may be installed after the operator
//! starts. Each probe lists its kind until the API answers, then flips its
//! [`ReadyFlag`] and exits.

use crate::readiness::ReadyFlag;
use crate::reconcilers::retry::{is_retryable_error, watch_backoff};
use anyhow::{bail, Result};
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether a probe error means the API is simply not there yet.
fn is_not_served(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404) || is_retryable_error(err)
}

/// Probe `K` until it is served, then mark `flag` ready.
///
/// # Errors
///
/// Returns an error when the API answers with something other than "not
/// found" or a transient failure (for example, missing RBAC), since waiting
/// longer will not help.
pub async fn wait_for_api<K>(client: Client, flag: Arc<ReadyFlag>) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let api: Api<K> = Api::all(client);
    let params = ListParams::default().limit(1);
    let mut backoff = watch_backoff();

    loop {
        match api.list(&params).await {
            Ok(_) => {
                info!(api = flag.name(), "API is available");
                flag.mark_ready();
                return Ok(());
            }
            Err(e) if is_not_served(&e) => {
                debug!(api = flag.name(), error = %e, "API not available yet");
            }
            Err(e) => {
                warn!(api = flag.name(), error = %e, "Giving up waiting for API");
                bail!("probing {} failed: {e}", flag.name());
            }
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or(Duration::from_secs(30));
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "watches_tests.rs"]
mod watches_tests;
