//! Command-line argument parsing

use crate::config::{
    DEFAULT_REGISTRY_PORT, DEFAULT_SSH_PORT, RegistryPort, SshTarget, TransferConfig,
};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "docker-push-ssh")]
#[command(
    about = "A utility to securely push a docker image from your local host to a remote host over ssh \
             without using docker save/load or needing to setup a private registry."
)]
#[command(version)]
pub struct Args {
    /// Host to push docker image to. (ex. username@myhost.com)
    pub ssh_host: String,

    /// Docker image tag(s) to push. Specify one or more separated by spaces.
    #[arg(required = true, num_args = 1..)]
    pub docker_image: Vec<String>,

    #[arg(
        long = "ssh-port",
        short = 'p',
        default_value = DEFAULT_SSH_PORT,
        help = "Port on ssh host to connect to"
    )]
    pub ssh_port: String,

    #[arg(
        long = "registry-port",
        short = 'r',
        default_value = DEFAULT_REGISTRY_PORT,
        help = "Remote registry port on ssh host to forward to"
    )]
    pub registry_port: String,

    /// Base images with which to prime the registry from the remote host.
    /// The pull is performed on the remote host. Repeatable.
    #[arg(long = "prime-image")]
    pub prime_image: Vec<String>,

    #[arg(
        long = "engine",
        help = "Container CLI used on both hosts [default: podman]"
    )]
    pub engine: Option<String>,

    #[arg(long = "registry-image", help = "Image run as the ephemeral registry [default: registry]")]
    pub registry_image: Option<String>,

    #[arg(long = "tunnel-retries", help = "Readiness probe attempts before giving up [default: 20]")]
    pub tunnel_retries: Option<u32>,

    #[arg(long = "tunnel-delay-ms", help = "Delay between readiness probe attempts [default: 1000]")]
    pub tunnel_delay_ms: Option<u64>,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print warnings and errors"
    )]
    pub quiet: bool,

    #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Build the run configuration. Environment overrides apply first;
    /// explicit flags win over them.
    pub fn into_config(self) -> Result<TransferConfig> {
        self.into_config_with_env(|key| std::env::var(key).ok())
    }

    pub fn into_config_with_env<F>(self, lookup: F) -> Result<TransferConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let registry_port = RegistryPort::parse(&self.registry_port)?;
        let target = SshTarget::new(self.ssh_host, self.ssh_port);

        let mut config = TransferConfig::new(target, self.docker_image)
            .with_prime_images(self.prime_image)
            .with_registry_port(registry_port)
            .apply_env(lookup)?;

        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(image) = self.registry_image {
            config.registry_image = image;
        }
        if let Some(retries) = self.tunnel_retries {
            config.tunnel_retries = retries;
        }
        if let Some(delay) = self.tunnel_delay_ms {
            config.tunnel_delay = Duration::from_millis(delay);
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.quiet {
            config.quiet = true;
            config.verbose = false;
        }

        config.validate()?;
        Ok(config)
    }
}
