//! Trigger dispatcher — launch an external program when an allow-listed
//! property is written.
//!
//! The allow-list is re-read on every check so edits take effect without a
//! restart. Launching goes through [`Spawner`] so tests can record
//! invocations instead of starting processes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use leprop_core::Property;

use crate::error::{io_err, ServiceError};

/// Capability to start a detached process.
pub trait Spawner: Send {
    /// Start `program` with `args` and return without waiting for it.
    fn spawn(&self, program: &Path, args: &[&str]) -> std::io::Result<()>;
}

/// Spawns real processes on the tokio runtime, which reaps them once they
/// exit. Must be called from within a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&self, program: &Path, args: &[&str]) -> std::io::Result<()> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(false)
            .spawn()?;
        tracing::debug!(program = %program.display(), pid = ?child.id(), "trigger started");
        Ok(())
    }
}

pub struct TriggerDispatcher {
    allow_list: PathBuf,
    program: PathBuf,
    spawner: Box<dyn Spawner>,
}

impl TriggerDispatcher {
    pub fn new(
        allow_list: impl Into<PathBuf>,
        program: impl Into<PathBuf>,
        spawner: Box<dyn Spawner>,
    ) -> Self {
        Self {
            allow_list: allow_list.into(),
            program: program.into(),
            spawner,
        }
    }

    /// Whether `name` appears, exactly, on a line of the allow-list.
    /// A missing allow-list registers nothing.
    pub fn is_registered(&self, name: &str) -> Result<bool, ServiceError> {
        let contents = match std::fs::read(&self.allow_list) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_err(&self.allow_list, err)),
        };
        Ok(String::from_utf8_lossy(&contents)
            .lines()
            .any(|line| line.trim_end_matches('\r') == name))
    }

    /// Fire the trigger for `property` if it is registered.
    /// Returns whether a process was launched.
    pub fn dispatch(&self, property: &Property) -> Result<bool, ServiceError> {
        if !self.is_registered(property.name.as_str())? {
            return Ok(false);
        }

        self.spawner
            .spawn(
                &self.program,
                &[property.name.as_str(), property.value.as_str()],
            )
            .map_err(|source| ServiceError::SpawnFailure {
                program: self.program.clone(),
                source,
            })?;
        tracing::info!(name = %property.name, value = %property.value, "trigger dispatched");
        Ok(true)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingSpawner, RecordingSpawner};
    use super::*;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir, spawner: Box<dyn Spawner>) -> TriggerDispatcher {
        TriggerDispatcher::new(
            dir.path().join("proptrigger.conf"),
            dir.path().join("proptrigger"),
            spawner,
        )
    }

    #[test]
    fn registered_name_fires_once_with_name_and_value() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("proptrigger.conf"), "ro.other\nro.trigger.test\n").unwrap();
        let spawner = RecordingSpawner::default();
        let triggers = dispatcher(&dir, Box::new(spawner.clone()));

        let fired = triggers
            .dispatch(&Property::new("ro.trigger.test", "go"))
            .unwrap();

        assert!(fired);
        let calls = spawner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, dir.path().join("proptrigger"));
        assert_eq!(calls[0].1, ["ro.trigger.test", "go"]);
    }

    #[test]
    fn unregistered_name_does_not_fire() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("proptrigger.conf"), "ro.trigger.test\n").unwrap();
        let spawner = RecordingSpawner::default();
        let triggers = dispatcher(&dir, Box::new(spawner.clone()));

        assert!(!triggers.dispatch(&Property::new("ro.trigger", "go")).unwrap());
        assert!(!triggers.dispatch(&Property::new("ro.trigger.test.x", "go")).unwrap());
        assert!(spawner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_allow_list_registers_nothing() {
        let dir = TempDir::new().unwrap();
        let triggers = dispatcher(&dir, Box::new(RecordingSpawner::default()));
        assert!(!triggers.is_registered("ro.trigger.test").unwrap());
    }

    #[test]
    fn allow_list_edits_apply_without_restart() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("proptrigger.conf");
        let triggers = dispatcher(&dir, Box::new(RecordingSpawner::default()));

        assert!(!triggers.is_registered("ro.late").unwrap());
        std::fs::write(&conf, "ro.late\r\n").unwrap();
        assert!(triggers.is_registered("ro.late").unwrap());
    }

    #[test]
    fn spawn_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("proptrigger.conf"), "ro.trigger.test\n").unwrap();
        let triggers = dispatcher(&dir, Box::new(FailingSpawner));

        let err = triggers
            .dispatch(&Property::new("ro.trigger.test", "go"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::SpawnFailure { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn process_spawner_launches_without_waiting() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("fired");
        let script = format!("echo \"$0=$1\" > {}", marker.display());

        ProcessSpawner
            .spawn(Path::new("/bin/sh"), &["-c", &script, "ro.x", "1"])
            .unwrap();

        let mut written = String::new();
        for _ in 0..100 {
            written = std::fs::read_to_string(&marker).unwrap_or_default();
            if written.ends_with('\n') {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(written.trim(), "ro.x=1");
    }
}
