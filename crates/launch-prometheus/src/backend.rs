use launch_core::MetricsBackend;
use launch_model::{FailureStage, ResourceType};
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, core::Collector, proto::MetricFamily};

/// Prometheus-backed [`MetricsBackend`].
///
/// Cloning is cheap; every clone reports into the same registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    syncs: IntCounterVec,
    version: IntGaugeVec,
    leases: IntCounterVec,
    launches: IntCounterVec,
    failures: IntCounterVec,
    active: IntGaugeVec,
}

impl PrometheusMetrics {
    /// Create a backend with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the launch metrics into an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let syncs = IntCounterVec::new(
            Opts::new("launch_jobset_syncs_total", "Job set diffs applied"),
            &["queue"],
        )?;
        let version = IntGaugeVec::new(
            Opts::new("launch_jobset_version", "Last applied job set version"),
            &["queue"],
        )?;
        let leases = IntCounterVec::new(
            Opts::new("launch_leases_total", "Lease attempts by outcome"),
            &["queue", "outcome"],
        )?;
        let launches = IntCounterVec::new(
            Opts::new("launch_runs_started_total", "Runs started by managers"),
            &["queue", "resource"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new("launch_job_failures_total", "Jobs reported failed"),
            &["queue", "stage"],
        )?;
        let active = IntGaugeVec::new(
            Opts::new("launch_active_runs", "Runs currently tracked by a manager"),
            &["queue"],
        )?;

        register(&registry, &syncs)?;
        register(&registry, &version)?;
        register(&registry, &leases)?;
        register(&registry, &launches)?;
        register(&registry, &failures)?;
        register(&registry, &active)?;

        Ok(Self {
            registry,
            syncs,
            version,
            leases,
            launches,
            failures,
            active,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Snapshot of every registered metric family.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

fn register<C>(registry: &Registry, collector: &C) -> prometheus::Result<()>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))
}

impl MetricsBackend for PrometheusMetrics {
    fn record_sync(&self, queue: &str, version: u64) {
        self.syncs.with_label_values(&[queue]).inc();
        self.version
            .with_label_values(&[queue])
            .set(i64::try_from(version).unwrap_or(i64::MAX));
    }

    fn record_lease(&self, queue: &str, granted: bool) {
        let outcome = if granted { "granted" } else { "lost" };
        self.leases.with_label_values(&[queue, outcome]).inc();
    }

    fn record_launch(&self, queue: &str, resource: ResourceType) {
        self.launches
            .with_label_values(&[queue, resource.as_str()])
            .inc();
    }

    fn record_failure(&self, queue: &str, stage: FailureStage) {
        self.failures
            .with_label_values(&[queue, stage.as_str()])
            .inc();
    }

    fn set_active_runs(&self, queue: &str, count: usize) {
        self.active
            .with_label_values(&[queue])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn exposition(metrics: &PrometheusMetrics) -> String {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metrics.gather(), &mut buf)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn has_line(text: &str, line: &str) -> bool {
        text.lines().any(|l| l == line)
    }

    #[test]
    fn counts_launches_and_failures() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_launch("gpu", ResourceType::Kubernetes);
        metrics.record_launch("gpu", ResourceType::Kubernetes);
        metrics.record_failure("gpu", FailureStage::Run);

        let text = exposition(&metrics);
        assert!(has_line(
            &text,
            r#"launch_runs_started_total{queue="gpu",resource="kubernetes"} 2"#
        ));
        assert!(has_line(
            &text,
            r#"launch_job_failures_total{queue="gpu",stage="run"} 1"#
        ));
    }

    #[test]
    fn gauges_track_latest_value() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_sync("cpu", 3);
        metrics.record_sync("cpu", 7);
        metrics.set_active_runs("cpu", 4);
        metrics.set_active_runs("cpu", 1);

        let text = exposition(&metrics);
        assert!(has_line(&text, r#"launch_jobset_version{queue="cpu"} 7"#));
        assert!(has_line(&text, r#"launch_jobset_syncs_total{queue="cpu"} 2"#));
        assert!(has_line(&text, r#"launch_active_runs{queue="cpu"} 1"#));
    }

    #[test]
    fn lease_outcomes_are_split() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_lease("q", true);
        metrics.record_lease("q", false);
        metrics.record_lease("q", false);

        let text = exposition(&metrics);
        assert!(has_line(&text, r#"launch_leases_total{outcome="granted",queue="q"} 1"#));
        assert!(has_line(&text, r#"launch_leases_total{outcome="lost",queue="q"} 2"#));
    }

    #[test]
    fn shared_registry_rejects_duplicates() {
        let registry = Registry::new();
        PrometheusMetrics::with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::with_registry(registry).is_err());
    }
}
