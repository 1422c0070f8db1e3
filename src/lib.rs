//! docker-push-ssh library
//!
//! Moves container images to a remote host over ssh through an ephemeral,
//! tunneled private registry that exists only for the duration of one transfer.

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod process;
pub mod registry;
pub mod sync;
pub mod tunnel;
pub mod workflow;

pub use config::{RegistryPort, SshTarget, TransferConfig};
pub use error::{Result, TransferError};
pub use output::OutputManager;
pub use workflow::{TransferWorkflow, WorkflowRun, WorkflowState};
