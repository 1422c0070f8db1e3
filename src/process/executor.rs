//! tokio-backed command execution

use super::{BackgroundProcess, CommandExecutor, CommandSpec, StepResult};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};

#[derive(Debug, Clone, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).envs(&spec.envs).kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CommandExecutor for TokioExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<StepResult> {
        let output = Self::command(spec)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TransferError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        Ok(StepResult::new(
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>> {
        let child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TransferError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        Ok(Box::new(TokioBackgroundProcess { child: Some(child) }))
    }
}

/// Owns a spawned child until it is terminated
pub struct TokioBackgroundProcess {
    child: Option<Child>,
}

#[async_trait]
impl BackgroundProcess for TokioBackgroundProcess {
    async fn terminate(&mut self) -> std::io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if child.try_wait()?.is_some() {
            return Ok(());
        }

        // kill() also reaps the child
        child.kill().await
    }

    fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}
