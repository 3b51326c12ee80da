#[macro_use]
extern crate tracing;

use crate::config::Config;
use crate::repository::k8s::K8sImpl;
use crate::repository::metrics::DatadogEmitter;
use crate::service::usage::UsageReporter;
use anyhow::Context;
use chrono::Utc;
use helper::init::init_subscriber;
use helper::monitoring::DatadogExporter;
#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;
use std::sync::Arc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod config;
mod repository;
mod service;

/*
One shot, meant to be scheduled (eg. by a k8s CronJob):

KUBECONFIG=~/.kube/config DD_API_KEY=<key> CLUSTER_NAME=ephemeral21a RUST_LOG=info cargo run --bin eph_usage
*/

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _guard = init_subscriber("eph_usage", "info")?;
    debug!("Tracing initialized.");

    let config = Config::from_env().context("Failed to load the configuration")?;
    // Shared by both points.
    let now = Utc::now();

    let lister = Arc::new(
        K8sImpl::new(config.page_size, config.request_timeout)
            .await
            .context("Cannot build the k8s client")?,
    );
    let exporter = Arc::new(DatadogExporter::new(
        config.datadog_url.clone(),
        config.api_key.clone(),
        config.app_key.clone(),
        config.request_timeout,
    ));
    let emitter = Arc::new(DatadogEmitter::new(exporter));

    info!(
        "Reporting ephemeral usage of {} to {:?} ({:?} submission)",
        config.cluster, config.datadog_url, config.submission_mode
    );
    let report = UsageReporter::new(
        lister,
        emitter,
        config.cluster.clone(),
        config.submission_mode,
    )
    .run(now)
    .await
    .map_err(|err| {
        error!("Usage report failed: {:#}", err);
        err
    })?;

    info!(
        "Reported {:.2} hours over {} ephemeral(s), {} skipped",
        report.total_hours, report.count, report.skipped
    );
    Ok(())
}
