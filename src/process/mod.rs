//! Process execution contract
//!
//! Every local or remote command the transfer issues goes through a
//! [`CommandExecutor`]. Blocking commands yield a [`StepResult`]; the ssh
//! tunnel is launched non-blocking and yields a [`BackgroundProcess`].

pub mod executor;

pub use executor::TokioExecutor;

use crate::config::SshTarget;
use crate::error::{Result, TransferError};
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// A command to run: executable, arguments and extra environment.
///
/// The child inherits the caller's environment; `envs` is applied on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// `ssh <target> "sh -l -c \"<script>\""`
    ///
    /// `script` must not contain double quotes.
    pub fn remote(target: &SshTarget, script: &str) -> Self {
        Self::new("ssh")
            .arg(target.host())
            .arg(format!("sh -l -c \"{}\"", script))
    }

    /// Human-readable command line, for verbose output
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Outcome of a blocking command: exit status plus captured output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepResult {
    pub fn new(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    pub fn success() -> Self {
        Self::new(Some(0), String::new(), String::new())
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn failed(&self) -> bool {
        !self.succeeded()
    }

    /// Turn a non-zero exit into a [`TransferError::CommandFailed`]
    pub fn into_result(self, stage: WorkflowState, description: impl Into<String>) -> Result<Self> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(TransferError::CommandFailed {
                stage,
                description: description.into(),
                result: self,
            })
        }
    }

    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs commands on behalf of the workflow
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run to completion and capture output.
    ///
    /// A non-zero exit is reported through [`StepResult`], not as an error;
    /// `Err` means the command could not be started at all.
    async fn execute(&self, spec: &CommandSpec) -> Result<StepResult>;

    /// Start without waiting. The returned handle owns the process.
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>>;
}

/// A running non-blocking command
#[async_trait]
pub trait BackgroundProcess: Send {
    /// Stop the process. Calling this on an already stopped process is a no-op.
    async fn terminate(&mut self) -> std::io::Result<()>;

    fn id(&self) -> Option<u32>;
}
