// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, PodTemplate, Secret};
use kube::{
    runtime::{controller::Action, reflector::ObjectRef, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use vigil::{
    certificates::SecretCertificateManager,
    config::OperatorConfig,
    constants::{DEFAULT_INSTANCE_NAME, KIND_INTRUSION_DETECTION},
    crd::{
        APIServer, DeepPacketInspection, ImageSet, Installation, IntrusionDetection, LicenseKey,
        ManagementCluster, ManagementClusterConnection,
    },
    errors::ReconcileError,
    labels::{K8S_MANAGED_BY, MANAGED_BY_INTRUSION_DETECTION},
    metrics::{
        gather_metrics, record_error, record_reconciliation_error, record_reconciliation_requeue,
        record_reconciliation_success,
    },
    readiness::ReadyFlag,
    reconcilers::{
        retry::{error_backoff, ExponentialBackoff},
        Reconciler,
    },
    status::StatusAggregator,
    store::KubeStore,
    watches::wait_for_api,
};

/// Shared state handed to every reconcile call.
struct Context {
    reconciler: Reconciler<Arc<KubeStore>>,
    /// Error backoff per object name, reset after a successful pass
    backoffs: Mutex<BTreeMap<String, ExponentialBackoff>>,
}

impl Context {
    fn next_backoff(&self, name: &str) -> Duration {
        let mut backoffs = self
            .backoffs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        backoffs
            .entry(name.to_string())
            .or_insert_with(error_backoff)
            .next_backoff()
            .unwrap_or(Duration::from_secs(vigil::constants::ERROR_BACKOFF_MAX_SECS))
    }

    fn reset_backoff(&self, name: &str) {
        if let Some(backoff) = self
            .backoffs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(name)
        {
            backoff.reset();
        }
    }
}

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads.max(1))
        .thread_name("vigil-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json|text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(
        operator_namespace = %config.operator_namespace,
        cluster_domain = %config.cluster_domain,
        "Starting intrusion detection operator"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let store = Arc::new(KubeStore::new(client.clone()));

    let aggregator = Arc::new(StatusAggregator::new(Arc::clone(&store)));
    let certs = Arc::new(SecretCertificateManager::new(Arc::clone(&store)));

    let license_api_ready = Arc::new(ReadyFlag::new("LicenseKeyAPI"));
    let dpi_api_ready = Arc::new(ReadyFlag::new("DeepPacketInspectionAPI"));
    spawn_probe(wait_for_api::<LicenseKey>(
        client.clone(),
        Arc::clone(&license_api_ready),
    ));
    spawn_probe(wait_for_api::<DeepPacketInspection>(
        client.clone(),
        Arc::clone(&dpi_api_ready),
    ));

    let ctx = Arc::new(Context {
        reconciler: Reconciler::new(
            Arc::clone(&store),
            aggregator.clone(),
            certs,
            license_api_ready,
            dpi_api_ready,
            config.reconciler_config(),
        ),
        backoffs: Mutex::new(BTreeMap::new()),
    });

    // Nothing here should ever return; if one does, exit so we get restarted
    tokio::select! {
        result = run_controller(client.clone(), &config.operator_namespace, ctx) => {
            error!("CRITICAL: IntrusionDetection controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("IntrusionDetection controller exited unexpectedly without error")
        }
        result = run_metrics_server(config.metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = run_status_publisher(aggregator, config.status_interval()) => {
            anyhow::bail!("status publisher exited unexpectedly")
        }
    }
}

fn spawn_probe<F>(probe: F)
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = probe.await {
            error!("API readiness probe failed: {e:#}");
        }
    });
}

/// Any change to `K` re-runs the `default` instance.
fn to_default<K>(_: K) -> Option<ObjectRef<IntrusionDetection>> {
    Some(ObjectRef::new(DEFAULT_INSTANCE_NAME))
}

/// Watch config for objects the operator renders.
fn managed_objects() -> Config {
    Config::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_INTRUSION_DETECTION}"))
}

fn watch_all<K>(client: &Client) -> Api<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    Api::all(client.clone())
}

/// Run the `IntrusionDetection` controller
async fn run_controller(
    client: Client,
    operator_namespace: &str,
    ctx: Arc<Context>,
) -> Result<()> {
    info!("Starting IntrusionDetection controller");

    let api = Api::<IntrusionDetection>::all(client.clone());

    Controller::new(api, Config::default())
        .watches(watch_all::<Deployment>(&client), managed_objects(), to_default)
        .watches(watch_all::<DaemonSet>(&client), managed_objects(), to_default)
        .watches(watch_all::<Job>(&client), managed_objects(), to_default)
        .watches(watch_all::<PodTemplate>(&client), managed_objects(), to_default)
        .watches(
            Api::<Secret>::namespaced(client.clone(), operator_namespace),
            Config::default(),
            to_default,
        )
        .watches(
            Api::<ConfigMap>::namespaced(client.clone(), operator_namespace),
            Config::default(),
            to_default,
        )
        .watches(watch_all::<Installation>(&client), Config::default(), to_default)
        .watches(watch_all::<ImageSet>(&client), Config::default(), to_default)
        .watches(watch_all::<LicenseKey>(&client), Config::default(), to_default)
        .watches(watch_all::<APIServer>(&client), Config::default(), to_default)
        .watches(watch_all::<ManagementCluster>(&client), Config::default(), to_default)
        .watches(
            watch_all::<ManagementClusterConnection>(&client),
            Config::default(),
            to_default,
        )
        .watches(
            watch_all::<DeepPacketInspection>(&client),
            Config::default(),
            to_default,
        )
        .run(reconcile_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `IntrusionDetection`
async fn reconcile_wrapper(
    instance: Arc<IntrusionDetection>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let name = instance.name_any();
    if name != DEFAULT_INSTANCE_NAME {
        debug!(name = %name, "Ignoring IntrusionDetection that is not {DEFAULT_INSTANCE_NAME}");
        return Ok(Action::await_change());
    }

    let start = Instant::now();
    match ctx.reconciler.reconcile().await {
        Ok(requeue) => {
            record_reconciliation_success(KIND_INTRUSION_DETECTION, start.elapsed());
            ctx.reset_backoff(&name);
            if requeue.is_zero() {
                Ok(Action::await_change())
            } else {
                debug!(requeue = ?requeue, "Requeueing IntrusionDetection");
                record_reconciliation_requeue(KIND_INTRUSION_DETECTION, "requested");
                Ok(Action::requeue(requeue))
            }
        }
        Err(e) => {
            record_reconciliation_error(KIND_INTRUSION_DETECTION, start.elapsed());
            record_error(KIND_INTRUSION_DETECTION, e.metric_label());
            error!("Failed to reconcile IntrusionDetection {}: {}", name, e);
            Err(e)
        }
    }
}

fn error_policy(
    instance: Arc<IntrusionDetection>,
    err: &ReconcileError,
    ctx: Arc<Context>,
) -> Action {
    let delay = ctx.next_backoff(&instance.name_any());
    warn!(retry_after = ?delay, error = %err, "Backing off IntrusionDetection");
    record_reconciliation_requeue(KIND_INTRUSION_DETECTION, "error");
    Action::requeue(delay)
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Serve `/metrics` and `/healthz`
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics server to {addr}"))?;
    info!("Metrics server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically fold workload health into `IntrusionDetection.status`
async fn run_status_publisher(
    aggregator: Arc<StatusAggregator<Arc<KubeStore>>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        aggregator.refresh().await;
        if let Err(e) = aggregator.publish().await {
            warn!(error = %e, "Failed to publish IntrusionDetection status");
        }
    }
}
