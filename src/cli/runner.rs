//! Runner: wires configuration, collaborators and output around one transfer

use crate::cli::args::{Args, OutputFormat};
use crate::config::{DEFAULT_SSH_PORT, LOCAL_REGISTRY_PORT, PROBE_TIMEOUT, TransferConfig};
use crate::error::Result;
use crate::output::OutputManager;
use crate::process::{CommandExecutor, TokioExecutor};
use crate::registry::{HttpProbe, ReadinessProbe};
use crate::workflow::{TransferWorkflow, WorkflowRun};
use std::sync::Arc;

pub struct Runner {
    config: TransferConfig,
    format: OutputFormat,
    output: OutputManager,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let format = args.output;
        let config = args.into_config()?;
        Ok(Self::from_config(config, format))
    }

    pub fn from_config(config: TransferConfig, format: OutputFormat) -> Self {
        let output = if config.quiet || format == OutputFormat::Json {
            OutputManager::new_quiet()
        } else {
            OutputManager::new(config.verbose)
        };

        Self {
            config,
            format,
            output,
        }
    }

    pub async fn run(&self) -> Result<WorkflowRun> {
        let executor: Arc<dyn CommandExecutor> = Arc::new(TokioExecutor::new());
        let probe: Arc<dyn ReadinessProbe> =
            Arc::new(HttpProbe::new(LOCAL_REGISTRY_PORT, PROBE_TIMEOUT)?);
        Ok(self.run_with(executor, probe).await)
    }

    pub async fn run_with(
        &self,
        executor: Arc<dyn CommandExecutor>,
        probe: Arc<dyn ReadinessProbe>,
    ) -> WorkflowRun {
        self.output.warning("[REQUIRED] Ensure localhost:5000 is added to your insecure registries.");
        if self.config.target.port() != DEFAULT_SSH_PORT {
            self.output.warning(&format!(
                "--ssh-port {} is not passed to ssh; set the port for {} in your ssh config",
                self.config.target.port(),
                self.config.target.host()
            ));
        }

        let workflow =
            TransferWorkflow::new(self.config.clone(), executor, probe, self.output.clone());
        let run = workflow.run().await;
        self.print_outcome(&run);
        run
    }

    fn print_outcome(&self, run: &WorkflowRun) {
        if self.format == OutputFormat::Json {
            match serde_json::to_string_pretty(&run.to_report(&self.config)) {
                Ok(json) => println!("{}", json),
                Err(err) => self.output.error(&format!("Could not serialize report: {}", err)),
            }
            return;
        }

        self.output.summary(
            "Transfer Summary",
            &[
                ("Host", self.config.target.host().to_string()),
                ("Images", self.config.images.join(", ")),
                ("Registry port", self.config.registry_port.to_string()),
                ("Final state", run.final_state.to_string()),
                ("Elapsed", self.output.format_duration(run.elapsed)),
            ],
        );

        if run.succeeded() {
            self.output.success(&format!(
                "Transferred {} image(s) in {}",
                run.report.pulled.len(),
                self.output.elapsed_time()
            ));
        } else if let Some(state) = run.failed_in() {
            self.output.error(&format!("Transfer failed during {}", state));
        }
    }
}
