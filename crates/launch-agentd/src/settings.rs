//! Process settings read from `LAUNCH_*` environment variables.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow, bail};
use launch_client::ClientConfig;
use launch_core::AgentConfig;
use launch_observe::{LoggerConfig, LoggerFormat};
use serde_json::Value;

pub struct Settings {
    pub agent: AgentConfig,
    pub client: ClientConfig,
    pub logger: LoggerConfig,
    /// Root of the per-run status files.
    pub status_dir: PathBuf,
    pub docker_bin: String,
    /// Where to dump the metrics exposition on exit, if anywhere.
    pub metrics_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("LAUNCH_BASE_URL").ok_or_else(|| anyhow!("LAUNCH_BASE_URL is required"))?;
        let mut client = ClientConfig::new(base_url);
        if let Some(key) = get("LAUNCH_API_KEY") {
            client = client.with_api_key(key);
        }
        if let Some(secs) = parse::<u64>(&get, "LAUNCH_TIMEOUT_SECS")? {
            client = client.with_timeout(Duration::from_secs(secs));
        }

        let entity = get("LAUNCH_ENTITY").ok_or_else(|| anyhow!("LAUNCH_ENTITY is required"))?;
        let mut agent = AgentConfig::new(entity, get("LAUNCH_PROJECT").unwrap_or_default());
        agent.queues = get("LAUNCH_QUEUES")
            .unwrap_or_else(|| "default".to_string())
            .split(',')
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
            .collect();
        if let Some(ms) = parse::<u64>(&get, "LAUNCH_SYNC_INTERVAL_MS")? {
            agent.sync_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&get, "LAUNCH_RECONCILE_INTERVAL_MS")? {
            agent.reconcile_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&get, "LAUNCH_POLL_INTERVAL_MS")? {
            agent.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<usize>(&get, "LAUNCH_MAX_JOBS_AUTO")? {
            agent.max_jobs_auto_cluster = n;
        }
        if let Some(raw) = get("LAUNCH_QUEUE_DEFAULTS") {
            agent.queue_defaults = serde_json::from_str::<Value>(&raw)
                .context("LAUNCH_QUEUE_DEFAULTS is not valid JSON")?;
        }
        agent.validate()?;

        let mut logger = LoggerConfig::default();
        if let Some(format) = get("LAUNCH_LOG_FORMAT") {
            logger.format = LoggerFormat::from_str(&format)?;
        }
        if let Some(level) = get("LAUNCH_LOG_LEVEL") {
            logger = logger.with_directives(level);
        }

        let status_dir = get("LAUNCH_STATUS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("launch-agent"));

        Ok(Self {
            agent,
            client,
            logger,
            status_dir,
            docker_bin: get("LAUNCH_DOCKER_BIN").unwrap_or_else(|| "docker".to_string()),
            metrics_file: get("LAUNCH_METRICS_FILE").map(PathBuf::from),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => bail!("{key}={raw}: {e}"),
        },
    }
}
