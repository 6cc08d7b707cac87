use async_trait::async_trait;
use launch_core::{CoreError, LaunchProject, RunHandle, Runner};
use serde_json::Value;
use tokio::process::Command;
use tracing::{instrument, trace};

use crate::{
    error::{ExecError, ExecResult},
    process::ProcessHandle,
    util::{override_args, scalar_to_string, string_pairs},
};

/// Runs `local-container` jobs through the docker CLI.
///
/// The run handle tracks the foreground `docker run` client; cancelling it
/// signals the client, which forwards the signal to the container.
pub struct ContainerRunner {
    name: &'static str,
    binary: String,
}

impl ContainerRunner {
    pub fn new() -> Self {
        Self {
            name: "container",
            binary: "docker".to_string(),
        }
    }

    /// Use another docker-compatible CLI (`podman`, `nerdctl`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Full argument list for `<binary> run`.
    pub fn run_args(&self, project: &LaunchProject, image: &str) -> ExecResult<Vec<String>> {
        if image.trim().is_empty() {
            return Err(ExecError::MissingImage);
        }
        let block = project.resource_block();

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            format!("launch-{}", project.run_id),
        ];
        for (k, v) in string_pairs(block.and_then(|b| b.get("labels"))) {
            args.push("--label".into());
            args.push(format!("{k}={v}"));
        }
        args.push("-e".into());
        args.push(format!("LAUNCH_RUN_ID={}", project.run_id));
        for (k, v) in string_pairs(block.and_then(|b| b.get("env"))) {
            args.push("-e".into());
            args.push(format!("{k}={v}"));
        }
        match block.and_then(|b| b.get("args")) {
            None | Some(Value::Null) => {}
            Some(Value::Array(extra)) => args.extend(extra.iter().map(scalar_to_string)),
            Some(other) => {
                return Err(ExecError::InvalidArgs(format!(
                    "container args must be a list, got {other}"
                )));
            }
        }

        args.push(image.to_string());
        args.extend(project.entry_point.iter().cloned());
        args.extend(override_args(&project.overrides));
        Ok(args)
    }
}

impl Default for ContainerRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for ContainerRunner {
    fn name(&self) -> &'static str {
        self.name
    }

    #[instrument(level = "debug", skip(self, project), fields(run = %project.run_id))]
    async fn run(
        &self,
        project: &LaunchProject,
        image_uri: &str,
    ) -> Result<Option<Box<dyn RunHandle>>, CoreError> {
        let args = self.run_args(project, image_uri)?;
        trace!(binary = %self.binary, ?args, "spawn");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).kill_on_drop(true);
        let handle = ProcessHandle::spawn(&project.run_id, cmd)?;
        Ok(Some(Box::new(handle)))
    }
}
