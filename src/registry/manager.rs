//! Remote registry container lifecycle

use crate::config::{
    REGISTRY_CONTAINER_NAME, REGISTRY_CONTAINER_PORT, REGISTRY_VOLUME, RegistryPort, SshTarget,
};
use crate::error::Result;
use crate::output::OutputManager;
use crate::process::{CommandExecutor, CommandSpec, StepResult};
use crate::workflow::WorkflowState;
use std::sync::Arc;

pub struct RemoteRegistry {
    executor: Arc<dyn CommandExecutor>,
    output: OutputManager,
    engine: String,
    image: String,
}

impl RemoteRegistry {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        output: OutputManager,
        engine: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            output,
            engine: engine.into(),
            image: image.into(),
        }
    }

    /// Remove any previous container, then start a fresh one bound to
    /// `127.0.0.1:<port>` on the remote side. The removal may fail when no
    /// container exists; only the launch decides the outcome.
    pub fn start_command(&self, target: &SshTarget, port: RegistryPort) -> CommandSpec {
        let script = format!(
            "{engine} rm -f {name}; {engine} run -d -v {volume} --name {name} -p 127.0.0.1:{port}:{inner} {image}",
            engine = self.engine,
            name = REGISTRY_CONTAINER_NAME,
            volume = REGISTRY_VOLUME,
            port = port,
            inner = REGISTRY_CONTAINER_PORT,
            image = self.image,
        );
        CommandSpec::remote(target, &script)
    }

    pub fn stop_command(&self, target: &SshTarget) -> CommandSpec {
        CommandSpec::remote(
            target,
            &format!("{} rm -f {}", self.engine, REGISTRY_CONTAINER_NAME),
        )
    }

    pub async fn start(&self, target: &SshTarget, port: RegistryPort) -> Result<StepResult> {
        let spec = self.start_command(target, port);
        self.output.detail(&spec.command_line());

        let result = self.executor.execute(&spec).await?;
        let result = result.into_result(WorkflowState::RegistrySetup, "Registry setup")?;
        self.output
            .step(&format!("Registry {} listening on 127.0.0.1:{}", REGISTRY_CONTAINER_NAME, port));
        Ok(result)
    }

    /// Best-effort removal; failures are reported and otherwise ignored
    pub async fn stop(&self, target: &SshTarget) {
        let spec = self.stop_command(target);
        self.output.detail(&spec.command_line());

        match self.executor.execute(&spec).await {
            Ok(result) if result.succeeded() => {
                self.output.step("Removed remote registry container");
            }
            Ok(result) => self.output.warning(&format!(
                "Could not remove remote registry container ({})",
                result.exit_description()
            )),
            Err(err) => self
                .output
                .warning(&format!("Could not remove remote registry container: {}", err)),
        }
    }
}
