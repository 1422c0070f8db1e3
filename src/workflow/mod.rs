//! Transfer workflow orchestration
//!
//! [`TransferWorkflow::run`] drives one transfer through
//! `RegistrySetup -> TunnelEstablish -> TunnelReady -> Priming -> Tagging ->
//! Pushing -> RemotePull`. The first failure skips straight to `Cleanup`,
//! which runs on every path and never changes the outcome.

pub mod state;

pub use state::WorkflowState;

use crate::config::{LOCAL_REGISTRY_PORT, TransferConfig, local_registry_address};
use crate::error::{Result, TransferError};
use crate::output::OutputManager;
use crate::process::CommandExecutor;
use crate::registry::{ReadinessProbe, RemoteRegistry};
use crate::sync::{ImageSyncPipeline, SyncReport};
use crate::tunnel::{ReadinessPolicy, TunnelHandle, TunnelManager};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one run
#[derive(Debug)]
pub struct WorkflowRun {
    pub final_state: WorkflowState,
    /// Every state entered, starting with `Init`
    pub states: Vec<WorkflowState>,
    pub failure: Option<TransferError>,
    pub report: SyncReport,
    pub elapsed: Duration,
}

impl WorkflowRun {
    pub fn succeeded(&self) -> bool {
        self.final_state == WorkflowState::Done
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }

    /// The main-sequence state the run failed in
    pub fn failed_in(&self) -> Option<WorkflowState> {
        self.failure.as_ref()?;
        self.states
            .iter()
            .rev()
            .copied()
            .find(|state| state.is_main_sequence())
    }

    pub fn to_report(&self, config: &TransferConfig) -> TransferReport {
        TransferReport {
            host: config.target.host().to_string(),
            images: config.images.clone(),
            registry_port: config.registry_port.get(),
            local_registry: local_registry_address(),
            final_state: self.final_state,
            states: self.states.clone(),
            error: self.failure.as_ref().map(ToString::to_string),
            sync: self.report.clone(),
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

/// Machine-readable summary printed with `--output json`
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub host: String,
    pub images: Vec<String>,
    pub registry_port: u16,
    pub local_registry: String,
    pub final_state: WorkflowState,
    pub states: Vec<WorkflowState>,
    pub error: Option<String>,
    #[serde(flatten)]
    pub sync: SyncReport,
    pub elapsed_secs: f64,
}

struct RunContext {
    states: Vec<WorkflowState>,
    report: SyncReport,
    tunnel: Option<TunnelHandle>,
}

pub struct TransferWorkflow {
    config: TransferConfig,
    output: OutputManager,
    registry: RemoteRegistry,
    tunnels: TunnelManager,
    pipeline: ImageSyncPipeline,
    probe: Arc<dyn ReadinessProbe>,
}

impl TransferWorkflow {
    pub fn new(
        config: TransferConfig,
        executor: Arc<dyn CommandExecutor>,
        probe: Arc<dyn ReadinessProbe>,
        output: OutputManager,
    ) -> Self {
        let registry = RemoteRegistry::new(
            executor.clone(),
            output.clone(),
            config.engine.clone(),
            config.registry_image.clone(),
        );
        let tunnels = TunnelManager::new(executor.clone(), output.clone());
        let pipeline = ImageSyncPipeline::new(
            executor,
            output.clone(),
            config.engine.clone(),
            config.target.clone(),
            config.registry_port,
        );

        Self {
            config,
            output,
            registry,
            tunnels,
            pipeline,
            probe,
        }
    }

    pub async fn run(&self) -> WorkflowRun {
        let started = Instant::now();
        let mut ctx = RunContext {
            states: vec![WorkflowState::Init],
            report: SyncReport::default(),
            tunnel: None,
        };

        let outcome = self.main_sequence(&mut ctx).await;
        if let Err(err) = &outcome {
            self.report_failure(err);
        }

        self.enter(&mut ctx, WorkflowState::Cleanup);
        self.cleanup(&mut ctx).await;

        let final_state = if outcome.is_ok() {
            WorkflowState::Done
        } else {
            WorkflowState::Failed
        };
        self.enter(&mut ctx, final_state);

        WorkflowRun {
            final_state,
            states: ctx.states,
            failure: outcome.err(),
            report: ctx.report,
            elapsed: started.elapsed(),
        }
    }

    fn enter(&self, ctx: &mut RunContext, state: WorkflowState) {
        self.output.debug(&format!("State -> {}", state));
        ctx.states.push(state);
    }

    async fn main_sequence(&self, ctx: &mut RunContext) -> Result<()> {
        let target = &self.config.target;
        let images = &self.config.images;

        self.enter(ctx, WorkflowState::RegistrySetup);
        self.output.section("Setting up secure private registry...");
        self.registry.start(target, self.config.registry_port).await?;

        self.enter(ctx, WorkflowState::TunnelEstablish);
        self.output.section("Establishing SSH Tunnel...");
        let tunnel = self
            .tunnels
            .establish(target, LOCAL_REGISTRY_PORT, self.config.registry_port)?;
        ctx.tunnel = Some(tunnel);

        self.enter(ctx, WorkflowState::TunnelReady);
        self.output.info("Waiting for SSH Tunnel Initialization...");
        let policy = ReadinessPolicy {
            retries: self.config.tunnel_retries,
            delay: self.config.tunnel_delay,
        };
        self.tunnels.wait_ready(self.probe.as_ref(), policy).await?;

        self.enter(ctx, WorkflowState::Priming);
        let prime_images = self.config.distinct_prime_images();
        if !prime_images.is_empty() {
            self.output.section("Priming Registry with base images...");
        }
        self.pipeline.prime(&prime_images, &mut ctx.report).await?;

        self.enter(ctx, WorkflowState::Tagging);
        self.output.section("Tagging image(s) for push...");
        self.pipeline.tag(images, &mut ctx.report).await?;

        self.enter(ctx, WorkflowState::Pushing);
        self.output.section("Pushing Image(s) from local host...");
        self.pipeline.push(images, &mut ctx.report).await?;

        self.enter(ctx, WorkflowState::RemotePull);
        self.output.section("Pulling and Retagging Image on remote host...");
        self.pipeline.pull(images, &mut ctx.report).await?;

        Ok(())
    }

    /// Registry container, then tunnel, then local tags. Errors are warnings.
    async fn cleanup(&self, ctx: &mut RunContext) {
        self.output.section("Cleaning up...");

        self.registry.stop(&self.config.target).await;

        if let Some(mut tunnel) = ctx.tunnel.take() {
            match tunnel.terminate().await {
                Ok(()) => self.output.step("SSH tunnel closed"),
                Err(err) => self
                    .output
                    .warning(&format!("Could not stop SSH tunnel: {}", err)),
            }
        }

        self.pipeline.remove_local_tags(&self.config.images).await;
    }

    fn report_failure(&self, err: &TransferError) {
        self.output.error(&err.to_string());
        if let Some(result) = err.step_result() {
            self.output.command_output(result);
        }
        if let Some(hints) = err.remediation() {
            for hint in hints {
                self.output.error(&hint);
            }
        }
    }
}
