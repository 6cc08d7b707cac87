use std::{
    path::PathBuf,
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use launch_core::{CoreError, LaunchProject, RunHandle, Runner};
use launch_model::RunState;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    error::{ExecError, ExecResult},
    util::{KILL_GRACE, kill_graceful, override_args, string_pairs},
};

/// Process launch settings derived from a project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Run the joined command line through the platform shell.
    pub shell: bool,
}

impl ProcConfig {
    /// `entry_point` followed by the override args; env, cwd and shell mode
    /// come from the project's resource block.
    pub fn from_project(project: &LaunchProject) -> ExecResult<Self> {
        let (program, rest) = project
            .entry_point
            .split_first()
            .ok_or(ExecError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let block = project.resource_block();
        let mut args = rest.to_vec();
        args.extend(override_args(&project.overrides));

        let mut env = vec![
            ("LAUNCH_RUN_ID".to_string(), project.run_id.clone()),
            ("LAUNCH_ENTITY".to_string(), project.entity.clone()),
            ("LAUNCH_PROJECT".to_string(), project.project.clone()),
        ];
        env.extend(string_pairs(block.and_then(|b| b.get("env"))));

        let cwd = block
            .and_then(|b| b.get("cwd"))
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let shell = block
            .and_then(|b| b.get("shell"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            program: program.clone(),
            args,
            env,
            cwd,
            shell,
        })
    }

    pub fn command(&self) -> Command {
        let mut cmd = if self.shell {
            let line = std::iter::once(self.program.as_str())
                .chain(self.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            cfg_if::cfg_if! {
                if #[cfg(target_family = "windows")] {
                    let mut cmd = Command::new("cmd");
                    cmd.arg("/C").arg(line);
                } else {
                    let mut cmd = Command::new("sh");
                    cmd.arg("-c").arg(line);
                }
            }
            cmd
        } else {
            let mut cmd = Command::new(&self.program);
            cmd.args(&self.args);
            cmd
        };

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Runs `local-process` jobs as children of the agent.
pub struct ProcessRunner {
    name: &'static str,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self { name: "process" }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    fn name(&self) -> &'static str {
        self.name
    }

    #[instrument(level = "debug", skip(self, project, _image_uri), fields(run = %project.run_id))]
    async fn run(
        &self,
        project: &LaunchProject,
        _image_uri: &str,
    ) -> Result<Option<Box<dyn RunHandle>>, CoreError> {
        let cfg = ProcConfig::from_project(project)?;
        trace!(program = %cfg.program, args = ?cfg.args, shell = cfg.shell, "spawn");
        let handle = ProcessHandle::spawn(&project.run_id, cfg.command())?;
        Ok(Some(Box::new(handle)))
    }
}

/// Handle to a spawned child; a monitor task owns the child itself.
pub struct ProcessHandle {
    id: String,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
}

impl ProcessHandle {
    pub fn spawn(id: &str, mut cmd: Command) -> ExecResult<Self> {
        let child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
        let state = Arc::new(Mutex::new(RunState::Running));
        let cancel = CancellationToken::new();
        info!(run = id, pid = ?child.id(), "process started");

        tokio::spawn(monitor(
            id.to_string(),
            child,
            Arc::clone(&state),
            cancel.clone(),
        ));

        Ok(Self {
            id: id.to_string(),
            state,
            cancel,
        })
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn monitor(id: String, mut child: Child, state: Arc<Mutex<RunState>>, cancel: CancellationToken) {
    let finished = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => {
                debug!(run = %id, "exit success");
                RunState::Finished
            }
            Ok(status) => {
                match status.code() {
                    Some(code) => debug!(run = %id, code, "exit non-zero"),
                    None => debug!(run = %id, "terminated by signal"),
                }
                RunState::Failed
            }
            Err(e) => {
                warn!(run = %id, error = %e, "wait failed");
                RunState::Failed
            }
        },
        _ = cancel.cancelled() => {
            debug!(run = %id, "cancelled; killing child");
            if let Err(e) = kill_graceful(&mut child, KILL_GRACE).await {
                warn!(run = %id, error = %e, "kill failed");
            }
            RunState::Stopped
        }
    };
    *state.lock().unwrap_or_else(|e| e.into_inner()) = finished;
}

#[async_trait]
impl RunHandle for ProcessHandle {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_status(&self) -> Result<RunState, CoreError> {
        Ok(*self.state())
    }

    async fn cancel(&self) -> Result<(), CoreError> {
        self.cancel.cancel();
        Ok(())
    }
}
