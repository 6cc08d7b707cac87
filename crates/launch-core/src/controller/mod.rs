use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{error::CoreError, manager::Manager};

/// Drives one manager: reconcile every interval until cancelled.
pub struct Controller {
    queue: String,
    manager: Box<dyn Manager>,
    interval: Duration,
    token: CancellationToken,
}

impl Controller {
    pub fn new(
        queue: impl Into<String>,
        manager: Box<dyn Manager>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            queue: queue.into(),
            manager,
            interval,
            token,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Runs until the token is cancelled, then tears the manager down.
    ///
    /// Reconcile errors never end the loop.
    #[instrument(level = "info", skip(self), fields(queue = %self.queue, resource = %self.manager.resource()))]
    pub async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "controller started");
        self.report_orphans().await;

        loop {
            if self.token.is_cancelled() {
                break;
            }
            if let Err(e) = self.manager.reconcile().await {
                if e.is_transient() {
                    warn!(error = %e, "reconcile failed; retrying next interval");
                } else {
                    error!(error = %e, "reconcile failed");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.token.cancelled() => break,
            }
        }

        self.manager.teardown().await;
        info!("controller stopped");
    }

    async fn report_orphans(&self) {
        match self.manager.find_orphaned_jobs().await {
            Ok(orphans) if orphans.is_empty() => debug!("no orphaned runs"),
            Ok(orphans) => warn!(
                count = orphans.len(),
                jobs = ?orphans,
                "backend resources carry this queue's label but have no active run"
            ),
            Err(CoreError::OrphanDiscoveryUnsupported(resource)) => warn!(
                resource = %resource,
                "orphan discovery not supported; runs left by a previous agent must be reclaimed by hand"
            ),
            Err(e) => warn!(error = %e, "orphan discovery failed"),
        }
    }
}
