use async_trait::async_trait;
use docker_push_ssh::cli::{OutputFormat, Runner};
use docker_push_ssh::process::{BackgroundProcess, CommandExecutor, CommandSpec, StepResult};
use docker_push_ssh::registry::ReadinessProbe;
use docker_push_ssh::{
    OutputManager, RegistryPort, SshTarget, TransferConfig, TransferError, TransferWorkflow,
    WorkflowState,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Run(String),
    Spawn(String),
    Terminate,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// Records every command; fails those whose line contains a configured needle
#[derive(Default)]
struct FakeHost {
    fail_on: Vec<String>,
    fail_spawn: bool,
    log: CallLog,
}

impl FakeHost {
    fn new() -> Self {
        Self::default()
    }

    fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: vec![needle.to_string()],
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn runs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Run(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl CommandExecutor for FakeHost {
    async fn execute(&self, spec: &CommandSpec) -> docker_push_ssh::Result<StepResult> {
        let line = spec.command_line();
        self.log.lock().unwrap().push(Call::Run(line.clone()));

        if self.fail_on.iter().any(|needle| line.contains(needle.as_str())) {
            return Ok(StepResult::new(
                Some(1),
                String::new(),
                "simulated failure".to_string(),
            ));
        }
        Ok(StepResult::success())
    }

    fn spawn(&self, spec: &CommandSpec) -> docker_push_ssh::Result<Box<dyn BackgroundProcess>> {
        self.log
            .lock()
            .unwrap()
            .push(Call::Spawn(spec.command_line()));

        if self.fail_spawn {
            return Err(TransferError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "ssh not found"),
            });
        }
        Ok(Box::new(FakeTunnel {
            log: self.log.clone(),
        }))
    }
}

struct FakeTunnel {
    log: CallLog,
}

#[async_trait]
impl BackgroundProcess for FakeTunnel {
    async fn terminate(&mut self) -> std::io::Result<()> {
        self.log.lock().unwrap().push(Call::Terminate);
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        Some(4242)
    }
}

/// Ready from attempt `ready_at` on; never ready when `None`
struct FakeProbe {
    ready_at: Option<u32>,
    attempts: AtomicU32,
}

impl FakeProbe {
    fn ready() -> Self {
        Self::ready_at(1)
    }

    fn ready_at(attempt: u32) -> Self {
        Self {
            ready_at: Some(attempt),
            attempts: AtomicU32::new(0),
        }
    }

    fn never() -> Self {
        Self {
            ready_at: None,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ReadinessProbe for FakeProbe {
    async fn is_ready(&self) -> bool {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready_at.is_some_and(|at| attempt >= at)
    }

    fn endpoint(&self) -> String {
        "http://localhost:5000/v2/".to_string()
    }
}

fn config(images: &[&str]) -> TransferConfig {
    TransferConfig::new(
        SshTarget::new("user@h", "22"),
        images.iter().map(|i| i.to_string()).collect(),
    )
}

fn workflow(config: TransferConfig, host: &Arc<FakeHost>, probe: &Arc<FakeProbe>) -> TransferWorkflow {
    TransferWorkflow::new(
        config,
        host.clone(),
        probe.clone(),
        OutputManager::new_quiet(),
    )
}

const REGISTRY_START: &str = "ssh user@h 'sh -l -c \"podman rm -f docker-push-ssh-registry; \
    podman run -d -v /var/lib/registry:/var/lib/registry --name docker-push-ssh-registry \
    -p 127.0.0.1:5000:5000 registry\"'";
const REGISTRY_STOP: &str = "ssh user@h 'sh -l -c \"podman rm -f docker-push-ssh-registry\"'";
const TUNNEL: &str = "ssh -N -L *:5000:localhost:5000 user@h";

fn tag(image: &str) -> String {
    format!("podman tag {image} localhost:5000/{image}")
}

fn push(image: &str) -> String {
    format!("podman push localhost:5000/{image}")
}

fn pull(image: &str) -> String {
    format!(
        "ssh user@h 'sh -l -c \"podman pull localhost:5000/{image} && podman tag localhost:5000/{image} {image}\"'"
    )
}

fn remove(image: &str) -> String {
    format!("podman image rm localhost:5000/{image}")
}

#[tokio::test]
async fn test_single_image_transfer_reaches_done() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["app:1.0"]), &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Done);
    assert_eq!(run.exit_code(), 0);
    assert!(run.failure.is_none());
    assert_eq!(
        run.states,
        vec![
            WorkflowState::Init,
            WorkflowState::RegistrySetup,
            WorkflowState::TunnelEstablish,
            WorkflowState::TunnelReady,
            WorkflowState::Priming,
            WorkflowState::Tagging,
            WorkflowState::Pushing,
            WorkflowState::RemotePull,
            WorkflowState::Cleanup,
            WorkflowState::Done,
        ]
    );
    assert_eq!(
        host.calls(),
        vec![
            Call::Run(REGISTRY_START.to_string()),
            Call::Spawn(TUNNEL.to_string()),
            Call::Run(tag("app:1.0")),
            Call::Run(push("app:1.0")),
            Call::Run(pull("app:1.0")),
            Call::Run(REGISTRY_STOP.to_string()),
            Call::Terminate,
            Call::Run(remove("app:1.0")),
        ]
    );
}

#[tokio::test]
async fn test_stages_run_per_image_in_input_order() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["a:1", "b:2", "a:1"]), &host, &probe).run().await;
    assert!(run.succeeded());

    let runs = host.runs();
    let expected: Vec<String> = [tag("a:1"), tag("b:2"), tag("a:1")]
        .into_iter()
        .chain([push("a:1"), push("b:2"), push("a:1")])
        .chain([pull("a:1"), pull("b:2"), pull("a:1")])
        .collect();
    assert_eq!(&runs[1..10], expected.as_slice());
    assert_eq!(run.report.pushed, vec!["a:1", "b:2", "a:1"]);
    assert_eq!(run.report.pulled, vec!["a:1", "b:2", "a:1"]);
}

#[tokio::test]
async fn test_priming_runs_once_per_distinct_image_before_tagging() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::ready());
    let config = config(&["app:1.0"]).with_prime_images(vec![
        "alpine:3".to_string(),
        "debian:12".to_string(),
        "alpine:3".to_string(),
    ]);

    let run = workflow(config, &host, &probe).run().await;
    assert!(run.succeeded());
    assert_eq!(run.report.primed, vec!["alpine:3", "debian:12"]);

    let runs = host.runs();
    assert_eq!(
        runs[1],
        "ssh user@h 'sh -l -c \"podman pull alpine:3 && podman tag alpine:3 localhost:5000/alpine:3 \
         && podman push localhost:5000/alpine:3\"'"
    );
    assert!(runs[2].contains("podman pull debian:12"));
    assert_eq!(runs[3], tag("app:1.0"));
}

#[tokio::test]
async fn test_priming_failure_aborts_before_any_image_step() {
    let host = Arc::new(FakeHost::failing_on("podman pull alpine:3"));
    let probe = Arc::new(FakeProbe::ready());
    let config = config(&["app:1.0"])
        .with_prime_images(vec!["alpine:3".to_string(), "debian:12".to_string()]);

    let run = workflow(config, &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Failed);
    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.failed_in(), Some(WorkflowState::Priming));
    assert!(run.report.primed.is_empty());
    assert!(matches!(
        run.failure,
        Some(TransferError::CommandFailed {
            stage: WorkflowState::Priming,
            ..
        })
    ));

    let calls = host.calls();
    assert_eq!(calls.len(), 6);
    assert_eq!(calls[0], Call::Run(REGISTRY_START.to_string()));
    assert_eq!(calls[1], Call::Spawn(TUNNEL.to_string()));
    assert!(matches!(&calls[2], Call::Run(line) if line.contains("podman pull alpine:3")));
    assert_eq!(
        &calls[3..],
        &[
            Call::Run(REGISTRY_STOP.to_string()),
            Call::Terminate,
            Call::Run(remove("app:1.0")),
        ]
    );

    let runs = host.runs();
    assert!(!runs.iter().any(|line| line.contains("debian:12")));
    assert!(!runs.contains(&tag("app:1.0")));
    assert!(!runs.contains(&push("app:1.0")));
    assert!(!runs.contains(&pull("app:1.0")));
}

#[tokio::test]
async fn test_push_failure_skips_remaining_pushes_and_pulls() {
    let host = Arc::new(FakeHost::failing_on(&push("b:1")));
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["a:1", "b:1", "c:1"]), &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Failed);
    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.failed_in(), Some(WorkflowState::Pushing));
    assert_eq!(run.report.pushed, vec!["a:1"]);
    assert!(run.report.pulled.is_empty());

    let failure = run.failure.as_ref().unwrap();
    assert!(matches!(failure, TransferError::PushFailed { image, .. } if image == "b:1"));
    let hints = failure.remediation().unwrap();
    assert!(hints[0].contains("insecure registries"));
    assert_eq!(failure.step_result().unwrap().stderr, "simulated failure");

    let runs = host.runs();
    assert!(runs.contains(&push("a:1")));
    assert!(!runs.contains(&push("c:1")));
    assert!(!runs.iter().any(|line| line.contains("podman pull localhost:5000")));
    assert!(!run.states.contains(&WorkflowState::RemotePull));

    assert_eq!(host.count(&Call::Run(REGISTRY_STOP.to_string())), 1);
    assert_eq!(host.count(&Call::Terminate), 1);
    for image in ["a:1", "b:1", "c:1"] {
        assert_eq!(host.count(&Call::Run(remove(image))), 1);
    }
}

#[tokio::test]
async fn test_registry_setup_failure_never_opens_tunnel() {
    let host = Arc::new(FakeHost::failing_on("podman run -d"));
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["app:1.0"]), &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Failed);
    assert_eq!(run.failed_in(), Some(WorkflowState::RegistrySetup));
    assert_eq!(
        run.states,
        vec![
            WorkflowState::Init,
            WorkflowState::RegistrySetup,
            WorkflowState::Cleanup,
            WorkflowState::Failed,
        ]
    );
    assert_eq!(host.count(&Call::Spawn(TUNNEL.to_string())), 0);
    assert_eq!(host.count(&Call::Terminate), 0);
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(host.count(&Call::Run(REGISTRY_STOP.to_string())), 1);
    assert_eq!(host.count(&Call::Run(remove("app:1.0"))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tunnel_timeout_fails_before_any_image_step() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::never());
    let config = config(&["app:1.0"]).with_tunnel_budget(4, Duration::from_secs(1));

    let run = workflow(config, &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Failed);
    assert_eq!(run.failed_in(), Some(WorkflowState::TunnelReady));
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 4);
    match run.failure {
        Some(TransferError::TunnelTimeout { attempts, elapsed }) => {
            assert_eq!(attempts, 4);
            assert!(elapsed >= Duration::from_secs(3));
        }
        ref other => panic!("unexpected failure: {other:?}"),
    }
    assert!(!host.runs().contains(&tag("app:1.0")));
    assert_eq!(host.count(&Call::Terminate), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_tunnel_still_succeeds_within_budget() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::ready_at(5));

    let run = workflow(config(&["app:1.0"]), &host, &probe).run().await;

    assert!(run.succeeded());
    assert_eq!(probe.attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_tunnel_spawn_failure_goes_to_cleanup() {
    let host = Arc::new(FakeHost {
        fail_spawn: true,
        ..FakeHost::default()
    });
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["app:1.0"]), &host, &probe).run().await;

    assert_eq!(run.failed_in(), Some(WorkflowState::TunnelEstablish));
    assert!(matches!(run.failure, Some(TransferError::Spawn { .. })));
    assert_eq!(host.count(&Call::Terminate), 0);
    assert_eq!(host.count(&Call::Run(REGISTRY_STOP.to_string())), 1);
}

#[tokio::test]
async fn test_remote_pull_failure_stops_at_first_image() {
    let host = Arc::new(FakeHost::failing_on("podman pull localhost:5000/a:1"));
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["a:1", "b:1"]), &host, &probe).run().await;

    assert_eq!(run.failed_in(), Some(WorkflowState::RemotePull));
    assert_eq!(run.report.pushed, vec!["a:1", "b:1"]);
    assert!(run.report.pulled.is_empty());
    assert!(!host.runs().contains(&pull("b:1")));
    assert!(matches!(
        run.failure,
        Some(TransferError::CommandFailed {
            stage: WorkflowState::RemotePull,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cleanup_failures_do_not_change_outcome() {
    let host = Arc::new(FakeHost {
        fail_on: vec![REGISTRY_STOP.to_string(), "podman image rm".to_string()],
        ..FakeHost::default()
    });
    let probe = Arc::new(FakeProbe::ready());

    let run = workflow(config(&["app:1.0"]), &host, &probe).run().await;

    assert_eq!(run.final_state, WorkflowState::Done);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(
        run.states.iter().filter(|s| **s == WorkflowState::Cleanup).count(),
        1
    );
}

#[tokio::test]
async fn test_registry_port_applies_to_remote_side_only() {
    let host = Arc::new(FakeHost::new());
    let probe = Arc::new(FakeProbe::ready());
    let config = config(&["app:1.0"]).with_registry_port(RegistryPort::new(6000));

    let run = workflow(config, &host, &probe).run().await;
    assert!(run.succeeded());

    let calls = host.calls();
    assert!(matches!(&calls[0], Call::Run(line) if line.contains("-p 127.0.0.1:6000:5000")));
    assert_eq!(calls[1], Call::Spawn("ssh -N -L *:5000:localhost:6000 user@h".to_string()));
    assert_eq!(calls[2], Call::Run(tag("app:1.0")));
    assert_eq!(calls[3], Call::Run(push("app:1.0")));
    assert!(matches!(&calls[4], Call::Run(line) if line.contains("podman pull localhost:6000/app:1.0")));
}

#[tokio::test]
async fn test_runner_reports_exit_code() {
    let host = Arc::new(FakeHost::failing_on(&push("app:1.0")));
    let probe = Arc::new(FakeProbe::ready());
    let mut config = config(&["app:1.0"]);
    config.quiet = true;

    let runner = Runner::from_config(config, OutputFormat::Text);
    let run = runner.run_with(host.clone(), probe.clone()).await;

    assert_eq!(run.final_state, WorkflowState::Failed);
    assert_eq!(run.exit_code(), 1);
    assert_eq!(host.count(&Call::Terminate), 1);
}
