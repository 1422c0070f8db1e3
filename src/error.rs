//! Error handling module for docker-push-ssh

use crate::process::StepResult;
use crate::workflow::WorkflowState;
use std::time::Duration;
use thiserror::Error;

pub const INSECURE_REGISTRY_HINT: &str =
    "Error Pushing Image: Ensure localhost:5000 is added to your insecure registries.";
pub const INSECURE_REGISTRY_HELP_MACOS: &str =
    "https://stackoverflow.com/questions/32808215/where-to-set-the-insecure-registry-flag-on-mac-os";
pub const INSECURE_REGISTRY_HELP_LINUX: &str =
    "https://stackoverflow.com/questions/42211380/add-insecure-registry-to-docker";

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{description} failed during {stage}")]
    CommandFailed {
        stage: WorkflowState,
        description: String,
        result: StepResult,
    },

    #[error("Push of {image} failed")]
    PushFailed { image: String, result: StepResult },

    #[error("SSH tunnel failed to initialize after {attempts} attempts ({elapsed:?})")]
    TunnelTimeout { attempts: u32, elapsed: Duration },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TransferError {
    /// Captured output of the failing command, if the failure came from one
    pub fn step_result(&self) -> Option<&StepResult> {
        match self {
            TransferError::CommandFailed { result, .. } | TransferError::PushFailed { result, .. } => {
                Some(result)
            }
            _ => None,
        }
    }

    /// Follow-up instructions for the user, when a known fix exists
    pub fn remediation(&self) -> Option<Vec<String>> {
        match self {
            TransferError::PushFailed { .. } => Some(vec![
                INSECURE_REGISTRY_HINT.to_string(),
                format!("More Details (OS X): {}", INSECURE_REGISTRY_HELP_MACOS),
                format!("More Details (Linux): {}", INSECURE_REGISTRY_HELP_LINUX),
            ]),
            TransferError::TunnelTimeout { .. } => {
                Some(vec!["SSH Tunnel failed to initialize.".to_string()])
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
