//! `leprop service` — run the property daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use leprop_service::{start_blocking, ServiceConfig};

#[derive(Args, Debug)]
pub struct ServiceArgs {
    /// YAML configuration file. Flags below override its values.
    #[arg(long, env = "LEPROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listening socket path.
    #[arg(long, env = "LEPROP_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Properties loaded at startup.
    #[arg(long, env = "LEPROP_DEFAULT_PROPS")]
    pub default_props: Option<PathBuf>,

    /// File holding `persist.*` properties once storage is enabled.
    #[arg(long, env = "LEPROP_PERSIST_PROPS")]
    pub persist_props: Option<PathBuf>,

    /// Allow-list of property names that launch the trigger.
    #[arg(long, env = "LEPROP_TRIGGER_CONF")]
    pub trigger_conf: Option<PathBuf>,

    /// Program launched as `<trigger> <name> <value>`.
    #[arg(long, env = "LEPROP_TRIGGER_BINARY")]
    pub trigger_binary: Option<PathBuf>,

    /// Maximum simultaneously served connections.
    #[arg(long, env = "LEPROP_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,
}

impl ServiceArgs {
    pub fn run(self) -> Result<()> {
        let config = self.resolve()?;
        start_blocking(config).context("property service exited with error")
    }

    fn resolve(self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(socket) = self.socket {
            config.socket_path = socket;
        }
        if let Some(path) = self.default_props {
            config.default_props = path;
        }
        if let Some(path) = self.persist_props {
            config.persist_props = path;
        }
        if let Some(path) = self.trigger_conf {
            config.trigger_conf = path;
        }
        if let Some(path) = self.trigger_binary {
            config.trigger_binary = path;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max.max(1);
        }
        Ok(config)
    }
}
