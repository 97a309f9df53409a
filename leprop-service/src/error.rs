use std::path::PathBuf;

use thiserror::Error;

use leprop_core::PropError;

/// Error surface for the property daemon, its managers and the client stub.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("property not found: {0}")]
    NotFound(String),

    #[error("connection table full ({capacity} open)")]
    ResourceExhausted { capacity: usize },

    #[error("failed to persist properties to {path}: {source}")]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch trigger {program}: {source}")]
    SpawnFailure {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("property service is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

impl From<PropError> for ServiceError {
    fn from(err: PropError) -> Self {
        match err {
            PropError::NotFound(name) => ServiceError::NotFound(name),
            other => ServiceError::Protocol(other.to_string()),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServiceError {
    ServiceError::Io {
        path: path.into(),
        source,
    }
}
