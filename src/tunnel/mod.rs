//! SSH port-forward tunnel
//!
//! The tunnel is a long-running `ssh -N -L` process. It is started
//! non-blocking, observed only through the readiness probe and stopped
//! through its [`TunnelHandle`].

use crate::config::{RegistryPort, SshTarget};
use crate::error::{Result, TransferError};
use crate::output::OutputManager;
use crate::process::{BackgroundProcess, CommandExecutor, CommandSpec};
use crate::registry::ReadinessProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed-delay polling budget for tunnel readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            retries: 20,
            delay: Duration::from_secs(1),
        }
    }
}

/// Owns the single forwarding process of a run
pub struct TunnelHandle {
    process: Box<dyn BackgroundProcess>,
    local_port: u16,
    terminated: bool,
}

impl TunnelHandle {
    pub fn new(process: Box<dyn BackgroundProcess>, local_port: u16) -> Self {
        Self {
            process,
            local_port,
            terminated: false,
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Stop the forward. Repeated calls do nothing.
    pub async fn terminate(&mut self) -> std::io::Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        self.process.terminate().await
    }
}

pub struct TunnelManager {
    executor: Arc<dyn CommandExecutor>,
    output: OutputManager,
}

impl TunnelManager {
    pub fn new(executor: Arc<dyn CommandExecutor>, output: OutputManager) -> Self {
        Self { executor, output }
    }

    /// `ssh -N -L *:<local>:localhost:<remote> <target>`
    pub fn tunnel_command(target: &SshTarget, local_port: u16, remote_port: RegistryPort) -> CommandSpec {
        CommandSpec::new("ssh")
            .arg("-N")
            .arg("-L")
            .arg(format!("*:{}:localhost:{}", local_port, remote_port))
            .arg(target.host())
    }

    pub fn establish(
        &self,
        target: &SshTarget,
        local_port: u16,
        remote_port: RegistryPort,
    ) -> Result<TunnelHandle> {
        let spec = Self::tunnel_command(target, local_port, remote_port);
        self.output.detail(&spec.command_line());

        let process = self.executor.spawn(&spec)?;
        let handle = TunnelHandle::new(process, local_port);
        if let Some(pid) = handle.pid() {
            self.output.step(&format!("Tunnel process started (pid {})", pid));
        }
        Ok(handle)
    }

    /// Poll until the probe reports ready or the budget runs out.
    ///
    /// Returns the number of attempts used. Between failed attempts the loop
    /// sleeps for the full delay; no sleep follows the last attempt.
    pub async fn wait_ready(
        &self,
        probe: &dyn ReadinessProbe,
        policy: ReadinessPolicy,
    ) -> Result<u32> {
        let started = Instant::now();
        self.output.detail(&format!("Probing {}", probe.endpoint()));

        for attempt in 1..=policy.retries {
            if probe.is_ready().await {
                self.output
                    .step(&format!("Registry reachable after {} attempt(s)", attempt));
                return Ok(attempt);
            }
            self.output.debug(&format!(
                "Registry not reachable yet (attempt {}/{})",
                attempt, policy.retries
            ));
            if attempt < policy.retries {
                tokio::time::sleep(policy.delay).await;
            }
        }

        Err(TransferError::TunnelTimeout {
            attempts: policy.retries,
            elapsed: started.elapsed(),
        })
    }
}
