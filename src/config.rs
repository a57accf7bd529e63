// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every flag can also be set from the environment, which is how the
//! deployment manifests configure the operator.

use crate::constants::{
    DEFAULT_CLUSTER_DOMAIN, DEFAULT_METRICS_ADDR, DEFAULT_OPERATOR_NAMESPACE,
    DEFAULT_STATUS_INTERVAL_SECS, TOKIO_WORKER_THREADS,
};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Command line and environment configuration for the operator process.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "vigil", version, about = "Intrusion detection operator", long_about = None)]
pub struct OperatorConfig {
    /// Namespace the operator runs in; shared secrets are read from here
    #[arg(long, env = "VIGIL_OPERATOR_NAMESPACE", default_value = DEFAULT_OPERATOR_NAMESPACE)]
    pub operator_namespace: String,

    /// DNS domain of the cluster
    #[arg(long, env = "VIGIL_CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,

    /// Address serving `/metrics` and `/healthz`
    #[arg(long, env = "VIGIL_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Seconds between status publications
    #[arg(long, env = "VIGIL_STATUS_INTERVAL_SECS", default_value_t = DEFAULT_STATUS_INTERVAL_SECS)]
    pub status_interval_secs: u64,

    /// Tokio worker threads
    #[arg(long, env = "VIGIL_WORKER_THREADS", default_value_t = TOKIO_WORKER_THREADS)]
    pub worker_threads: usize,
}

impl OperatorConfig {
    #[must_use]
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    /// The part of the configuration a reconcile pass needs.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            operator_namespace: self.operator_namespace.clone(),
            cluster_domain: self.cluster_domain.clone(),
        }
    }
}

/// Settings used while resolving and rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub operator_namespace: String,
    pub cluster_domain: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
