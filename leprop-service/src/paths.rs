use std::path::PathBuf;

pub const SOCKET_DIR: &str = "/dev/socket";
pub const PROP_SERVICE_NAME: &str = "property_service";

pub const DEFAULT_PROPS_FILE: &str = "/etc/build.prop";
pub const PERSIST_PROPS_FILE: &str = "/data/persist/persist.prop";
pub const TRIGGER_CONF_FILE: &str = "/etc/proptrigger.conf";
pub const TRIGGER_BINARY: &str = "/usr/bin/proptrigger";

/// Permission bits applied to the listening socket file.
pub const SOCKET_MODE: u32 = 0o666;

/// Default bound on simultaneously served client connections.
pub const MAX_CONN: usize = 64;

/// Overrides the socket path for both the daemon and the client stub.
pub const SOCKET_ENV: &str = "LEPROP_SOCKET";

pub fn default_socket_path() -> PathBuf {
    PathBuf::from(SOCKET_DIR).join(PROP_SERVICE_NAME)
}

/// Socket the client stub connects to: `$LEPROP_SOCKET`, else the default.
pub fn socket_path() -> PathBuf {
    match std::env::var_os(SOCKET_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_socket_path(),
    }
}

/// Write-side temp file used while rewriting `path` wholesale.
pub fn staging_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
