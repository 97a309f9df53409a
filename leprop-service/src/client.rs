//! Client stub for the property daemon.
//!
//! One [`PropertyClient`] keeps one lazily opened connection. The lock is
//! held for the whole request/response exchange, so threads sharing a
//! client never read each other's replies. Callers only learn success or
//! failure; the reason is kept for display.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

use leprop_core::{Command, Reply, Request, MAX_MESSAGE_LEN};

use crate::error::{io_err, ServiceError};
use crate::paths;

/// The single failure outcome of a client call.
#[derive(Debug, Error)]
#[error("property request failed: {reason}")]
pub struct RequestFailed {
    reason: String,
}

impl RequestFailed {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<ServiceError> for RequestFailed {
    fn from(err: ServiceError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug)]
pub struct PropertyClient {
    socket: PathBuf,
    conn: Mutex<Option<UnixStream>>,
}

impl PropertyClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            conn: Mutex::new(None),
        }
    }

    /// Client for `$LEPROP_SOCKET`, or the default socket.
    pub fn from_env() -> Self {
        Self::new(paths::socket_path())
    }

    pub fn set_property(&self, name: &str, value: &str) -> Result<(), RequestFailed> {
        tracing::debug!(name, "setprop");
        match self.exchange(&Request::set(name, value))? {
            Reply::Ok {
                command: Command::Set,
                ..
            } => Ok(()),
            other => Err(RequestFailed::new(format!(
                "daemon rejected set of {name}: {other:?}"
            ))),
        }
    }

    /// Fetch a value. A miss, an error reply or an empty value all fail.
    pub fn get_property(&self, name: &str) -> Result<String, RequestFailed> {
        tracing::debug!(name, "getprop");
        match self.exchange(&Request::get(name))? {
            Reply::Ok {
                command: Command::Get,
                property,
            } if !property.value.is_empty() => Ok(property.value.to_string()),
            Reply::Ok { .. } => Err(RequestFailed::new(format!("{name} has no value"))),
            Reply::Error { .. } => Err(RequestFailed::new(format!("{name} is not set"))),
        }
    }

    /// Send one request and read one reply on the shared connection.
    /// A failed exchange drops the connection; the next call reconnects.
    fn exchange(&self, request: &Request) -> Result<Reply, ServiceError> {
        let mut guard = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(stream) = guard.as_mut() else {
            return Err(ServiceError::ChannelClosed("property connection"));
        };

        let result = round_trip(stream, request).map_err(|err| match err {
            ExchangeError::Io(source) => io_err(&self.socket, source),
            ExchangeError::Closed => {
                ServiceError::Protocol("daemon closed connection before responding".to_string())
            }
            ExchangeError::Decode(err) => ServiceError::from(err),
        });
        if result.is_err() {
            *guard = None;
        }
        result
    }

    fn connect(&self) -> Result<UnixStream, ServiceError> {
        UnixStream::connect(&self.socket).map_err(|err| {
            if matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) {
                ServiceError::DaemonNotRunning {
                    socket: self.socket.clone(),
                }
            } else {
                io_err(&self.socket, err)
            }
        })
    }
}

enum ExchangeError {
    Io(std::io::Error),
    Closed,
    Decode(leprop_core::PropError),
}

fn round_trip(stream: &mut UnixStream, request: &Request) -> Result<Reply, ExchangeError> {
    stream.write_all(&request.encode()).map_err(ExchangeError::Io)?;

    let mut buf = [0u8; MAX_MESSAGE_LEN];
    let read = loop {
        match stream.read(&mut buf) {
            Ok(0) => return Err(ExchangeError::Closed),
            Ok(read) => break read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(ExchangeError::Io(err)),
        }
    };
    Reply::decode(&buf[..read]).map_err(ExchangeError::Decode)
}

// ---------------------------------------------------------------------------
// Process-wide stub
// ---------------------------------------------------------------------------

fn shared() -> &'static PropertyClient {
    static CLIENT: OnceLock<PropertyClient> = OnceLock::new();
    CLIENT.get_or_init(PropertyClient::from_env)
}

/// Set a property through the process-wide client.
pub fn set_property(name: &str, value: &str) -> Result<(), RequestFailed> {
    shared().set_property(name, value)
}

/// Get a property through the process-wide client.
pub fn get_property(name: &str) -> Result<String, RequestFailed> {
    shared().get_property(name)
}
