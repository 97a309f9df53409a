//! The process-wide client reads `LEPROP_SOCKET` once, so it gets its own
//! test binary.

use std::thread::{self, sleep};
use std::time::{Duration, Instant};

use leprop_service::{get_property, paths, run, set_property, ProcessSpawner, ServiceConfig};
use tempfile::TempDir;

#[test]
fn free_functions_use_socket_from_environment() {
    let home = TempDir::new().expect("home");
    let config = ServiceConfig::rooted_at(home.path());
    let socket = config.socket_path.clone();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let daemon = thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(run(config, Box::new(ProcessSpawner), async {
            let _ = rx.await;
        }))
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !socket.exists() && Instant::now() < deadline {
        sleep(Duration::from_millis(20));
    }
    assert!(socket.exists(), "daemon socket did not appear in time");

    std::env::set_var(paths::SOCKET_ENV, &socket);

    set_property("ro.shared.client", "on").expect("set");
    assert_eq!(get_property("ro.shared.client").expect("get"), "on");
    assert!(get_property("never.set").is_err());

    let _ = tx.send(());
    daemon
        .join()
        .expect("daemon thread panicked")
        .expect("daemon exited with error");
}
