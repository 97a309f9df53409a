use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

use leprop_core::{Command, PropertyDb, Property, Reply, Request, MAX_MESSAGE_LEN};

use crate::config::ServiceConfig;
use crate::error::{io_err, ServiceError};
use crate::persist::PersistManager;
use crate::trigger::{ProcessSpawner, Spawner, TriggerDispatcher};

// ---------------------------------------------------------------------------
// Property service: database + persistence + triggers
// ---------------------------------------------------------------------------

/// Owns the database and both managers. Requests are handled one at a time
/// by whoever holds `&mut self`; in the daemon that is the reactor loop.
pub struct PropertyService {
    db: PropertyDb,
    persist: PersistManager,
    triggers: TriggerDispatcher,
}

impl PropertyService {
    pub fn new(config: &ServiceConfig, spawner: Box<dyn Spawner>) -> Self {
        Self {
            db: PropertyDb::new(),
            persist: PersistManager::new(&config.default_props, &config.persist_props),
            triggers: TriggerDispatcher::new(&config.trigger_conf, &config.trigger_binary, spawner),
        }
    }

    pub fn load_defaults(&mut self) -> Result<usize, ServiceError> {
        self.persist.load_defaults(&mut self.db)
    }

    pub fn db(&self) -> &PropertyDb {
        &self.db
    }

    /// Produce exactly one reply for `request`.
    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Set(property) => Reply::ok(Command::Set, self.set(property)),
            Request::Get(name) => match self.db.get(name.as_str()) {
                Ok(value) => Reply::ok(Command::Get, Property {
                    name,
                    value: value.clone(),
                }),
                Err(err) => {
                    tracing::debug!(error = %err, "get miss");
                    Reply::error(name)
                }
            },
        }
    }

    /// Commit `property`, then run persistence and trigger handling.
    /// Failures in either are logged; the committed value stands.
    pub fn set(&mut self, property: Property) -> Property {
        let previous = self.db.insert(property.clone());
        tracing::debug!(
            name = %property.name,
            value = %property.value,
            previous = ?previous.as_ref().map(|v| v.as_str()),
            "property set",
        );

        if let Err(err) = self.persist.on_set(&mut self.db, &property) {
            tracing::error!(name = %property.name, error = %err, "persisting property failed");
        }
        if let Err(err) = self.triggers.dispatch(&property) {
            tracing::error!(name = %property.name, error = %err, "property trigger failed");
        }
        property
    }

    /// Log every property; wired to `SIGUSR1`.
    pub fn dump_to_log(&self) {
        tracing::info!(
            count = self.db.len(),
            persist_ready = self.persist.is_ready(),
            "property dump",
        );
        for property in &self.db {
            tracing::info!(name = %property.name, value = %property.value, "property");
        }
    }
}

// ---------------------------------------------------------------------------
// Connection table
// ---------------------------------------------------------------------------

/// Opaque handle for an accepted client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    opened_at: Instant,
    requests: u64,
}

type ConnectionTable = HashMap<ConnectionId, ConnectionEntry>;

struct Job {
    conn: ConnectionId,
    request: Request,
    respond_to: oneshot::Sender<Reply>,
}

// ---------------------------------------------------------------------------
// Daemon entry points
// ---------------------------------------------------------------------------

/// Start the daemon on a single-threaded runtime and block until it exits.
pub fn start_blocking(config: ServiceConfig) -> Result<(), ServiceError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, Box::new(ProcessSpawner), shutdown_signal()))
}

/// Run the daemon until `shutdown` resolves.
pub async fn run(
    config: ServiceConfig,
    spawner: Box<dyn Spawner>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServiceError> {
    let mut service = PropertyService::new(&config, spawner);
    if let Err(err) = service.load_defaults() {
        tracing::warn!(error = %err, "failed to load default properties");
    }

    let listener = bind_listener(&config)?;
    tracing::info!(socket = %config.socket_path.display(), "property service is ready");

    let result = serve(listener, &config, service, shutdown).await;

    match fs::remove_file(&config.socket_path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(error = %err, "failed to remove property socket"),
    }
    result
}

async fn serve(
    listener: UnixListener,
    config: &ServiceConfig,
    mut service: PropertyService,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServiceError> {
    let capacity = config.max_connections.max(1);
    let slots = Arc::new(Semaphore::new(capacity));
    let (job_tx, mut job_rx) = mpsc::channel::<Job>(capacity);
    let mut table = ConnectionTable::new();
    let mut tasks = JoinSet::new();
    let mut next_id = 0u64;
    let mut dump = signal(SignalKind::user_defined1()).map_err(|e| io_err("SIGUSR1", e))?;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(open = table.len(), "shutting down property service");
                break;
            }
            accepted = accept_when_slot_free(&listener, &slots) => {
                let (stream, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                next_id += 1;
                let id = ConnectionId(next_id);
                table.insert(id, ConnectionEntry { opened_at: Instant::now(), requests: 0 });
                tasks.spawn(serve_connection(id, stream, job_tx.clone(), permit));
                tracing::debug!(conn = %id, open = table.len(), "connection registered");

                if slots.available_permits() == 0 {
                    tracing::warn!(
                        error = %ServiceError::ResourceExhausted { capacity },
                        "deferring new connections until a slot frees",
                    );
                }
            }
            Some(job) = job_rx.recv() => {
                if let Some(entry) = table.get_mut(&job.conn) {
                    entry.requests += 1;
                }
                let reply = service.handle(job.request);
                let _ = job.respond_to.send(reply);
            }
            Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                match finished {
                    Ok(id) => {
                        if let Some(entry) = table.remove(&id) {
                            tracing::debug!(
                                conn = %id,
                                requests = entry.requests,
                                open_ms = entry.opened_at.elapsed().as_millis(),
                                "connection removed",
                            );
                        }
                    }
                    Err(err) => tracing::error!(error = %err, "connection task failed"),
                }
            }
            _ = dump.recv() => service.dump_to_log(),
        }
    }

    tasks.shutdown().await;
    Ok(())
}

/// Wait for a free slot, then accept. With the table full, pending peers
/// stay in the listen backlog.
async fn accept_when_slot_free(
    listener: &UnixListener,
    slots: &Arc<Semaphore>,
) -> std::io::Result<(UnixStream, OwnedSemaphorePermit)> {
    let permit = slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| std::io::Error::other("connection slots closed"))?;
    let (stream, _) = accept_or_back_off(listener.accept()).await?;
    Ok((stream, permit))
}

/// Pause after a failed accept so a persistent error such as `EMFILE`
/// does not spin the reactor.
async fn accept_or_back_off<T>(
    accept: impl Future<Output = std::io::Result<T>>,
) -> std::io::Result<T> {
    let result = accept.await;
    if result.is_err() {
        tokio::time::sleep(ACCEPT_BACKOFF).await;
    }
    result
}

async fn serve_connection(
    id: ConnectionId,
    mut stream: UnixStream,
    jobs: mpsc::Sender<Job>,
    _slot: OwnedSemaphorePermit,
) -> ConnectionId {
    match connection_loop(id, &mut stream, &jobs).await {
        Ok(()) => tracing::debug!(conn = %id, "peer closed connection"),
        Err(err) => tracing::warn!(conn = %id, error = %err, "closing connection"),
    }
    id
}

/// One read is one request; every request gets exactly one reply.
async fn connection_loop(
    id: ConnectionId,
    stream: &mut UnixStream,
    jobs: &mpsc::Sender<Job>,
) -> Result<(), ServiceError> {
    // One spare byte tells an oversized request apart from a maximal one.
    let mut buf = [0u8; MAX_MESSAGE_LEN + 1];
    loop {
        let read = match stream.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                continue
            }
            Err(err) => return Err(io_err("property socket read", err)),
        };
        if read > MAX_MESSAGE_LEN {
            let dropped = drain_oversized(stream)?;
            tracing::warn!(conn = %id, dropped, "discarding tail of oversized request");
        }
        let message = &buf[..read];

        let reply = match Request::decode(message) {
            Ok(request) => submit(jobs, id, request).await?,
            Err(err) => {
                tracing::warn!(conn = %id, error = %err, "rejecting malformed request");
                Reply::rejecting(message)
            }
        };

        stream
            .write_all(&reply.encode())
            .await
            .map_err(|e| io_err("property socket write", e))?;
    }
}

/// Discard whatever is already queued after an oversized request, so its
/// tail is not read back as a request of its own.
fn drain_oversized(stream: &UnixStream) -> Result<usize, ServiceError> {
    let mut scratch = [0u8; MAX_MESSAGE_LEN];
    let mut dropped = 0usize;
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => return Ok(dropped),
            Ok(read) => dropped += read,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(dropped),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_err("property socket read", err)),
        }
    }
}

async fn submit(
    jobs: &mpsc::Sender<Job>,
    conn: ConnectionId,
    request: Request,
) -> Result<Reply, ServiceError> {
    let (tx, rx) = oneshot::channel();
    jobs.send(Job {
        conn,
        request,
        respond_to: tx,
    })
    .await
    .map_err(|_| ServiceError::ChannelClosed("request queue"))?;
    rx.await
        .map_err(|_| ServiceError::ChannelClosed("request reply"))
}

// ---------------------------------------------------------------------------
// Socket setup
// ---------------------------------------------------------------------------

fn bind_listener(config: &ServiceConfig) -> Result<UnixListener, ServiceError> {
    let socket = &config.socket_path;
    if let Some(dir) = socket.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    prepare_socket_for_bind(socket)?;

    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    set_socket_permissions(socket, config.socket_mode)?;
    Ok(listener)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), ServiceError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(io_err(
                socket,
                std::io::Error::new(ErrorKind::AddrInUse, "property socket already in use"),
            ));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale property socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn set_socket_permissions(path: &Path, mode: u32) -> Result<(), ServiceError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, e))
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(error = %err, "cannot listen for SIGTERM");
            None
        }
    };
    let term = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::warn!(error = %err, "ctrl-c handler failed");
            }
        }
        _ = term => tracing::info!("received SIGTERM"),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
