//! Configuration module: ssh target, ports and run settings

use crate::error::{Result, TransferError};
use serde::Serialize;
use std::time::Duration;

/// Fixed name of the ephemeral registry container on the remote host
pub const REGISTRY_CONTAINER_NAME: &str = "docker-push-ssh-registry";
/// Storage mount for the registry container
pub const REGISTRY_VOLUME: &str = "/var/lib/registry:/var/lib/registry";
/// Port the registry listens on inside its container
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;
/// Local end of the tunnel. Local tag/push always target this port.
pub const LOCAL_REGISTRY_PORT: u16 = 5000;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_SSH_PORT: &str = "22";
pub const DEFAULT_REGISTRY_PORT: &str = "5000";
pub const DEFAULT_ENGINE: &str = "podman";
pub const DEFAULT_REGISTRY_IMAGE: &str = "registry";
pub const DEFAULT_TUNNEL_RETRIES: u32 = 20;
pub const DEFAULT_TUNNEL_DELAY_MS: u64 = 1000;

/// `user@host` plus the ssh port given on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshTarget {
    host: String,
    port: String,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

/// Port of the remote registry bind and the tunnel's remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryPort(u16);

impl RegistryPort {
    pub fn new(port: u16) -> Self {
        Self(port)
    }

    pub fn parse(value: &str) -> Result<Self> {
        parse_port(value, "registry port").map(Self)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl Default for RegistryPort {
    fn default() -> Self {
        Self(5000)
    }
}

impl std::fmt::Display for RegistryPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry address used by the local tag and push steps
pub fn local_registry_address() -> String {
    format!("localhost:{}", LOCAL_REGISTRY_PORT)
}

/// Registry address used by remote priming and pulls
pub fn remote_registry_address(port: RegistryPort) -> String {
    format!("localhost:{}", port)
}

fn parse_port(value: &str, what: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(TransferError::Config(format!(
            "Invalid {}: {} (expected 1-65535)",
            what, value
        ))),
        Ok(port) => Ok(port),
    }
}

/// Image references end up inside `sh -l -c "..."` on the remote host,
/// so only the characters a reference can legitimately contain are allowed.
pub fn validate_image_reference(reference: &str) -> Result<()> {
    if reference.is_empty() {
        return Err(TransferError::Config(
            "Image reference cannot be empty".to_string(),
        ));
    }

    let valid = reference
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | ':' | '@'));
    if !valid {
        return Err(TransferError::Config(format!(
            "Invalid image reference: {}",
            reference
        )));
    }

    Ok(())
}

/// Fully resolved settings for one transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferConfig {
    pub target: SshTarget,
    pub images: Vec<String>,
    pub prime_images: Vec<String>,
    pub registry_port: RegistryPort,
    pub engine: String,
    pub registry_image: String,
    pub tunnel_retries: u32,
    pub tunnel_delay: Duration,
    pub verbose: bool,
    pub quiet: bool,
}

impl TransferConfig {
    pub fn new(target: SshTarget, images: Vec<String>) -> Self {
        Self {
            target,
            images,
            prime_images: Vec::new(),
            registry_port: RegistryPort::default(),
            engine: DEFAULT_ENGINE.to_string(),
            registry_image: DEFAULT_REGISTRY_IMAGE.to_string(),
            tunnel_retries: DEFAULT_TUNNEL_RETRIES,
            tunnel_delay: Duration::from_millis(DEFAULT_TUNNEL_DELAY_MS),
            verbose: false,
            quiet: false,
        }
    }

    pub fn with_prime_images(mut self, prime_images: Vec<String>) -> Self {
        self.prime_images = prime_images;
        self
    }

    pub fn with_registry_port(mut self, port: RegistryPort) -> Self {
        self.registry_port = port;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_tunnel_budget(mut self, retries: u32, delay: Duration) -> Self {
        self.tunnel_retries = retries;
        self.tunnel_delay = delay;
        self
    }

    /// Prime images with duplicates removed, first occurrence wins
    pub fn distinct_prime_images(&self) -> Vec<String> {
        let mut distinct: Vec<String> = Vec::with_capacity(self.prime_images.len());
        for image in &self.prime_images {
            if !distinct.contains(image) {
                distinct.push(image.clone());
            }
        }
        distinct
    }

    /// Apply `DOCKER_PUSH_SSH_*` environment overrides
    pub fn from_env(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = lookup("DOCKER_PUSH_SSH_ENGINE") {
            self.engine = engine;
        }
        if let Some(image) = lookup("DOCKER_PUSH_SSH_REGISTRY_IMAGE") {
            self.registry_image = image;
        }
        if let Some(retries) = lookup("DOCKER_PUSH_SSH_TUNNEL_RETRIES") {
            self.tunnel_retries = retries.parse().map_err(|_| {
                TransferError::Config(format!("Invalid DOCKER_PUSH_SSH_TUNNEL_RETRIES: {}", retries))
            })?;
        }
        if let Some(delay) = lookup("DOCKER_PUSH_SSH_TUNNEL_DELAY_MS") {
            let millis: u64 = delay.parse().map_err(|_| {
                TransferError::Config(format!("Invalid DOCKER_PUSH_SSH_TUNNEL_DELAY_MS: {}", delay))
            })?;
            self.tunnel_delay = Duration::from_millis(millis);
        }
        if let Some(verbose) = lookup("DOCKER_PUSH_SSH_VERBOSE") {
            self.verbose = verbose.to_lowercase() == "true" || verbose == "1";
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.host().trim().is_empty() {
            return Err(TransferError::Config("SSH host cannot be empty".to_string()));
        }
        parse_port(self.target.port(), "ssh port")?;

        if self.images.is_empty() {
            return Err(TransferError::Config(
                "At least one image must be specified".to_string(),
            ));
        }
        for image in self.images.iter().chain(&self.prime_images) {
            validate_image_reference(image)?;
        }
        validate_image_reference(&self.registry_image)?;

        if self.engine.trim().is_empty() || self.engine.contains(char::is_whitespace) {
            return Err(TransferError::Config(format!(
                "Invalid container engine: {:?}",
                self.engine
            )));
        }
        if self.tunnel_retries == 0 {
            return Err(TransferError::Config(
                "Tunnel retries must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
