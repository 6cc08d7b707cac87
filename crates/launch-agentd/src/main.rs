mod settings;
mod shutdown;

use std::sync::Arc;

use anyhow::Context;
use launch_client::HttpQueueClient;
use launch_core::{Agent, Backend, BackendRouter, MetricsHandle, QueueService};
use launch_exec::{ContainerRunner, DirTrackerFactory, ProcessRunner, SourceBuilder};
use launch_model::ResourceType;
use launch_observe::logger_init;
use launch_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
use tracing::{error, info, warn};

use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Settings + logger
    let settings = Settings::from_env()?;
    logger_init(&settings.logger)?;
    info!(
        entity = %settings.agent.entity,
        queues = ?settings.agent.queues,
        service = %settings.client.graphql_url(),
        "logger initialized"
    );

    // 2) Collaborators
    let service: Arc<dyn QueueService> = Arc::new(HttpQueueClient::new(settings.client.clone())?);
    let router = local_backends(&settings);
    let trackers = Arc::new(DirTrackerFactory::new(&settings.status_dir));
    let metrics = PrometheusMetrics::new().context("metrics registry")?;
    let metrics_handle: MetricsHandle = Arc::new(metrics.clone());

    // 3) Register
    let agent = Agent::builder(settings.agent.clone(), service)
        .with_router(router)
        .with_trackers(trackers)
        .with_metrics(metrics_handle)
        .register()
        .await?;
    info!(agent = %agent.id(), name = %agent.name(), "agent registered");

    // 4) Serve until a signal or the service asks us to stop. Signals are
    // watched from here on so a stuck start can still be interrupted.
    let signals = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move {
            shutdown::signal().await;
            agent.request_stop();
        }
    });
    let started = agent.start().await;
    match &started {
        Ok(()) => {
            info!("agent running; press Ctrl+C to stop");
            agent.stop_requested().await;
        }
        Err(e) => error!(error = %e, "agent failed to start"),
    }
    signals.abort();

    info!("shutting down...");
    agent.shutdown().await;

    if let Some(path) = &settings.metrics_file {
        let mut buf = Vec::new();
        match TextEncoder::new().encode(&metrics.gather(), &mut buf) {
            Ok(()) => {
                if let Err(e) = std::fs::write(path, buf) {
                    warn!(path = %path.display(), error = %e, "metrics dump failed");
                }
            }
            Err(e) => warn!(error = %e, "metrics encoding failed"),
        }
    }

    started.map_err(Into::into)
}

/// Backends this binary can drive without cloud credentials.
fn local_backends(settings: &Settings) -> BackendRouter {
    let source = Arc::new(SourceBuilder);
    BackendRouter::new()
        .with(
            ResourceType::LocalProcess,
            Backend::new(source.clone(), Arc::new(ProcessRunner::new())),
        )
        .with(
            ResourceType::LocalContainer,
            Backend::new(
                source.clone(),
                Arc::new(ContainerRunner::new().with_binary(settings.docker_bin.clone())),
            ),
        )
        .with(
            ResourceType::Scheduler,
            Backend::new(source, Arc::new(ProcessRunner::new().with_name("scheduler"))),
        )
}
