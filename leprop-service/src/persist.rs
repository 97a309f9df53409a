//! Persistence manager — durable `persist.*` properties.
//!
//! Storage starts dormant. Writing `le.persistprop.enable=true` activates it
//! exactly once: the persist file is merged into the database and then the
//! whole `persist.*` set is written back, so values set earlier in this boot
//! survive. From then on every `persist.*` write rewrites the file from
//! scratch.
//!
//! File format: one `name=value` per line, first `=` separates. Blank lines
//! and `#` comments are ignored. A missing file loads nothing.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use leprop_core::{PropName, Property, PropertyDb, PERSIST_ENABLE_PROP};

use crate::error::{io_err, ServiceError};
use crate::paths::staging_path;

const ACTIVATION_VALUE: &str = "true";

/// What the manager did in response to a property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Nothing to persist for this write.
    Skipped,
    /// Storage became ready; `loaded` entries came from disk, `saved` went back.
    Activated { loaded: usize, saved: usize },
    /// The persist file was rewritten with `saved` entries.
    Saved { saved: usize },
}

#[derive(Debug)]
pub struct PersistManager {
    default_path: PathBuf,
    persist_path: PathBuf,
    ready: bool,
    /// `persist.*` names written by clients while storage was dormant.
    written_while_dormant: HashSet<PropName>,
}

impl PersistManager {
    pub fn new(default_path: impl Into<PathBuf>, persist_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
            persist_path: persist_path.into(),
            ready: false,
            written_while_dormant: HashSet::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn persist_path(&self) -> &Path {
        &self.persist_path
    }

    /// Startup load of the default properties file.
    pub fn load_defaults(&self, db: &mut PropertyDb) -> Result<usize, ServiceError> {
        load_file(&self.default_path, db, |_| false)
    }

    /// Apply the persistence policy to a write that has already been
    /// committed to `db`. Errors never undo the in-memory change.
    pub fn on_set(
        &mut self,
        db: &mut PropertyDb,
        property: &Property,
    ) -> Result<PersistOutcome, ServiceError> {
        if !self.ready
            && property.name.as_str() == PERSIST_ENABLE_PROP
            && property.value.as_str() == ACTIVATION_VALUE
        {
            return self.activate(db);
        }

        if !property.name.is_persistent() {
            return Ok(PersistOutcome::Skipped);
        }

        if self.ready {
            let saved = self.save(db)?;
            Ok(PersistOutcome::Saved { saved })
        } else {
            self.written_while_dormant.insert(property.name.clone());
            Ok(PersistOutcome::Skipped)
        }
    }

    /// Switch to ready, merge the persist file, then write everything back.
    /// A second call is a no-op.
    pub fn activate(&mut self, db: &mut PropertyDb) -> Result<PersistOutcome, ServiceError> {
        if self.ready {
            return Ok(PersistOutcome::Skipped);
        }
        self.ready = true;

        let dormant = std::mem::take(&mut self.written_while_dormant);
        let loaded = match load_file(&self.persist_path, db, |name| dormant.contains(name)) {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "could not load persist file during activation");
                0
            }
        };
        let saved = self.save(db)?;
        tracing::info!(loaded, saved, path = %self.persist_path.display(), "persistent storage ready");
        Ok(PersistOutcome::Activated { loaded, saved })
    }

    /// Rewrite the persist file from scratch with every `persist.*` entry.
    ///
    /// The content goes to a staging file first and is renamed over the
    /// target, so a crash leaves either the old or the new snapshot.
    pub fn save(&self, db: &PropertyDb) -> Result<usize, ServiceError> {
        let mut contents = String::new();
        let mut saved = 0usize;
        for property in db.persistent() {
            contents.push_str(&property.to_line());
            contents.push('\n');
            saved += 1;
        }

        let tmp = staging_path(&self.persist_path);
        let persist_err = |source| ServiceError::PersistenceFailure {
            path: self.persist_path.clone(),
            source,
        };
        std::fs::write(&tmp, contents).map_err(persist_err)?;
        if let Err(err) = std::fs::rename(&tmp, &self.persist_path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(persist_err(err));
        }

        tracing::debug!(saved, path = %self.persist_path.display(), "persist file rewritten");
        Ok(saved)
    }
}

/// Insert every parsable line of `path` into `db`, except names for which
/// `skip` returns true. Returns the number of entries applied.
pub fn load_file(
    path: &Path,
    db: &mut PropertyDb,
    skip: impl Fn(&PropName) -> bool,
) -> Result<usize, ServiceError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no property file, nothing to load");
            return Ok(0);
        }
        Err(err) => return Err(io_err(path, err)),
    };

    let mut applied = 0usize;
    for (index, line) in String::from_utf8_lossy(&bytes).lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match Property::parse_line(trimmed) {
            Ok(property) if skip(&property.name) => {
                tracing::debug!(name = %property.name, "keeping value written this boot");
            }
            Ok(property) => {
                db.insert(property);
                applied += 1;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), line = index + 1, error = %err, "skipping property line");
            }
        }
    }

    tracing::info!(path = %path.display(), applied, "loaded properties");
    Ok(applied)
}
