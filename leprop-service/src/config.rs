//! Daemon configuration.
//!
//! Built-in defaults, optionally overlaid by a YAML file. Any key missing
//! from the file keeps its default; the CLI applies its own flags on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ServiceError};
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub socket_mode: u32,
    pub default_props: PathBuf,
    pub persist_props: PathBuf,
    pub trigger_conf: PathBuf,
    pub trigger_binary: PathBuf,
    pub max_connections: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: paths::default_socket_path(),
            socket_mode: paths::SOCKET_MODE,
            default_props: PathBuf::from(paths::DEFAULT_PROPS_FILE),
            persist_props: PathBuf::from(paths::PERSIST_PROPS_FILE),
            trigger_conf: PathBuf::from(paths::TRIGGER_CONF_FILE),
            trigger_binary: PathBuf::from(paths::TRIGGER_BINARY),
            max_connections: paths::MAX_CONN,
        }
    }
}

impl ServiceConfig {
    /// Load a YAML config file on top of the defaults.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::from_yaml(path, &contents)
    }

    fn from_yaml(path: &Path, contents: &str) -> Result<Self, ServiceError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents).map_err(|source| ServiceError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Every path rooted under `dir`; used by tests and local runs.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            socket_path: dir.join(paths::PROP_SERVICE_NAME),
            default_props: dir.join("build.prop"),
            persist_props: dir.join("persist.prop"),
            trigger_conf: dir.join("proptrigger.conf"),
            trigger_binary: dir.join("proptrigger"),
            ..Self::default()
        }
    }

    fn normalized(mut self) -> Self {
        // A zero-sized table would never accept anyone.
        self.max_connections = self.max_connections.max(1);
        self
    }
}
