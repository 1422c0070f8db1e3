//! Ephemeral registry on the remote host
//!
//! [`RemoteRegistry`] creates and removes the registry container over ssh;
//! [`HttpProbe`] checks the Registry HTTP API v2 root through the tunnel.

pub mod manager;
pub mod probe;

pub use manager::RemoteRegistry;
pub use probe::{HttpProbe, ReadinessProbe};
