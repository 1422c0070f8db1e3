use serde::Serialize;
use std::fmt;

/// States of one transfer run, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowState {
    Init,
    RegistrySetup,
    TunnelEstablish,
    TunnelReady,
    Priming,
    Tagging,
    Pushing,
    RemotePull,
    Cleanup,
    Done,
    Failed,
}

impl WorkflowState {
    /// Whether a failure in this state counts against the run
    pub fn is_main_sequence(self) -> bool {
        matches!(
            self,
            WorkflowState::RegistrySetup
                | WorkflowState::TunnelEstablish
                | WorkflowState::TunnelReady
                | WorkflowState::Priming
                | WorkflowState::Tagging
                | WorkflowState::Pushing
                | WorkflowState::RemotePull
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkflowState::Init => "Init",
            WorkflowState::RegistrySetup => "RegistrySetup",
            WorkflowState::TunnelEstablish => "TunnelEstablish",
            WorkflowState::TunnelReady => "TunnelReady",
            WorkflowState::Priming => "Priming",
            WorkflowState::Tagging => "Tagging",
            WorkflowState::Pushing => "Pushing",
            WorkflowState::RemotePull => "RemotePull",
            WorkflowState::Cleanup => "Cleanup",
            WorkflowState::Done => "Done",
            WorkflowState::Failed => "Failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
