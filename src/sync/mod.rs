//! Image sync pipeline
//!
//! Four strictly sequential stages over the image list: priming,
//! local tagging, local push, remote pull and retag. Each stage walks its
//! images in input order and stops at the first failing image.

use crate::config::{RegistryPort, SshTarget, local_registry_address, remote_registry_address};
use crate::error::{Result, TransferError};
use crate::output::OutputManager;
use crate::process::{CommandExecutor, CommandSpec, StepResult};
use crate::workflow::WorkflowState;
use serde::Serialize;
use std::sync::Arc;

/// What each stage completed, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub primed: Vec<String>,
    pub tagged: Vec<String>,
    pub pushed: Vec<String>,
    pub pulled: Vec<String>,
}

pub struct ImageSyncPipeline {
    executor: Arc<dyn CommandExecutor>,
    output: OutputManager,
    engine: String,
    target: SshTarget,
    registry_port: RegistryPort,
}

impl ImageSyncPipeline {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        output: OutputManager,
        engine: impl Into<String>,
        target: SshTarget,
        registry_port: RegistryPort,
    ) -> Self {
        Self {
            executor,
            output,
            engine: engine.into(),
            target,
            registry_port,
        }
    }

    /// `localhost:5000/<image>`, used by the local tag and push
    pub fn local_reference(image: &str) -> String {
        format!("{}/{}", local_registry_address(), image)
    }

    /// `localhost:<registry port>/<image>`, as the remote host sees it
    pub fn remote_reference(&self, image: &str) -> String {
        format!("{}/{}", remote_registry_address(self.registry_port), image)
    }

    pub fn prime_command(&self, image: &str) -> CommandSpec {
        let seeded = self.remote_reference(image);
        let script = format!(
            "{engine} pull {image} && {engine} tag {image} {seeded} && {engine} push {seeded}",
            engine = self.engine,
        );
        CommandSpec::remote(&self.target, &script)
    }

    pub fn tag_command(&self, image: &str) -> CommandSpec {
        CommandSpec::new(&self.engine)
            .arg("tag")
            .arg(image)
            .arg(Self::local_reference(image))
    }

    pub fn push_command(&self, image: &str) -> CommandSpec {
        CommandSpec::new(&self.engine)
            .arg("push")
            .arg(Self::local_reference(image))
    }

    pub fn pull_command(&self, image: &str) -> CommandSpec {
        let through_tunnel = self.remote_reference(image);
        let script = format!(
            "{engine} pull {through_tunnel} && {engine} tag {through_tunnel} {image}",
            engine = self.engine,
        );
        CommandSpec::remote(&self.target, &script)
    }

    pub fn remove_local_command(&self, image: &str) -> CommandSpec {
        CommandSpec::new(&self.engine)
            .arg("image")
            .arg("rm")
            .arg(Self::local_reference(image))
    }

    async fn run(&self, spec: &CommandSpec) -> Result<StepResult> {
        self.output.detail(&spec.command_line());
        self.executor.execute(spec).await
    }

    /// Pull each base image on the remote host and seed it into the registry
    pub async fn prime(&self, images: &[String], report: &mut SyncReport) -> Result<()> {
        for image in images {
            self.output.info(&format!("Priming base image ({})", image));
            self.run(&self.prime_command(image))
                .await?
                .into_result(WorkflowState::Priming, format!("Priming {}", image))?;
            report.primed.push(image.clone());
        }
        Ok(())
    }

    pub async fn tag(&self, images: &[String], report: &mut SyncReport) -> Result<()> {
        for image in images {
            self.run(&self.tag_command(image))
                .await?
                .into_result(WorkflowState::Tagging, format!("Tagging {}", image))?;
            self.output
                .step(&format!("Tagged {} as {}", image, Self::local_reference(image)));
            report.tagged.push(image.clone());
        }
        Ok(())
    }

    pub async fn push(&self, images: &[String], report: &mut SyncReport) -> Result<()> {
        for image in images {
            let result = self.run(&self.push_command(image)).await?;
            if result.failed() {
                return Err(TransferError::PushFailed {
                    image: image.clone(),
                    result,
                });
            }
            self.output
                .success(&format!("Pushed Image {} Successfully...", image));
            report.pushed.push(image.clone());
        }
        Ok(())
    }

    pub async fn pull(&self, images: &[String], report: &mut SyncReport) -> Result<()> {
        for image in images {
            self.run(&self.pull_command(image))
                .await?
                .into_result(WorkflowState::RemotePull, format!("Remote pull of {}", image))?;
            self.output
                .success(&format!("Pulled Image {} Successfully...", image));
            report.pulled.push(image.clone());
        }
        Ok(())
    }

    /// Remove the `localhost:5000/...` tags. Best-effort, never fails.
    pub async fn remove_local_tags(&self, images: &[String]) {
        for image in images {
            let reference = Self::local_reference(image);
            match self.run(&self.remove_local_command(image)).await {
                Ok(result) if result.succeeded() => {
                    self.output.step(&format!("Removed {}", reference));
                }
                Ok(result) => self.output.debug(&format!(
                    "Could not remove {} ({})",
                    reference,
                    result.exit_description()
                )),
                Err(err) => self
                    .output
                    .warning(&format!("Could not remove {}: {}", reference, err)),
            }
        }
    }
}
