use docker_push_ssh::OutputManager;
use docker_push_ssh::cli::{Args, Runner};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args();

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(err) => {
            OutputManager::default().error(&err.to_string());
            return ExitCode::FAILURE;
        }
    };

    match runner.run().await {
        Ok(run) if run.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            OutputManager::default().error(&err.to_string());
            ExitCode::FAILURE
        }
    }
}
