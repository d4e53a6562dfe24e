use std::{path::PathBuf, sync::Arc};

use pkgdb_config::config::Config;
use pkgdb_core::{
    snapshot, ArtifactTypeRegistry, PackageDatabase, SharedDatabase, TraitContext,
};
use pkgdb_events::{EventSink, EventSinkHandle};
use pkgdb_utils::{lock::FileLock, path::resolve_path};
use tracing::{debug, info};

use crate::error::CliResult;

/// Everything a command needs: config, type registry and the snapshot location.
pub struct Session {
    pub config: Config,
    pub registry: ArtifactTypeRegistry,
    pub savor_context: TraitContext,
    pub db_path: PathBuf,
    events: EventSinkHandle,
}

impl Session {
    /// Registers the configured artifact types; `db_override` wins over the config.
    pub fn new(config: Config, db_override: Option<&str>, events: EventSinkHandle) -> CliResult<Self> {
        let registry = ArtifactTypeRegistry::new();
        for ty in &config.artifact_types {
            registry.register(&ty.name, ty.installable)?;
        }
        let savor_context = TraitContext::new(config.savor_context(), '|')?;
        let db_path = match db_override {
            Some(path) => resolve_path(path)?,
            None => config.get_db_path()?,
        };
        debug!(path = %db_path.display(), "using package database");

        Ok(Self {
            config,
            registry,
            savor_context,
            db_path,
            events,
        })
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub fn load(&self) -> CliResult<Arc<PackageDatabase>> {
        Ok(snapshot::load_or_empty(
            &self.registry,
            &self.db_path,
            self.sink(),
        )?)
    }

    fn lock_name(&self) -> String {
        format!("db-{}", self.db_path.display())
    }

    /// Runs a read-modify-write cycle on the snapshot file.
    ///
    /// The file is locked for the whole cycle and only rewritten when the
    /// published root changed.
    pub fn modify<T, F>(&self, mutation: F) -> CliResult<T>
    where
        F: FnOnce(&SharedDatabase) -> CliResult<T>,
    {
        let name = self.lock_name();
        let lock = match FileLock::try_acquire(&name)? {
            Some(lock) => lock,
            None => {
                info!("Waiting for another pkgdb process to release the database");
                FileLock::acquire(&name)?
            }
        };
        debug!(lock = %lock.path().display(), "acquired database lock");

        let base = self.load()?;
        let shared = SharedDatabase::new(base.clone());
        let result = mutation(&shared)?;

        let db = shared.snapshot();
        if Arc::ptr_eq(&db, &base) {
            info!("Nothing changed");
        } else {
            snapshot::save(&db, &self.db_path, self.config.compress(), self.sink())?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use pkgdb_core::ChangedInfo;
    use pkgdb_events::NullSink;
    use tempfile::tempdir;

    use super::*;

    fn session(path: &std::path::Path) -> Session {
        Session::new(
            Config::default_config(),
            path.to_str(),
            Arc::new(NullSink),
        )
        .unwrap()
    }

    #[test]
    fn test_registers_configured_types() {
        let dir = tempdir().unwrap();
        let session = session(&dir.path().join("packages.db"));
        assert!(session.registry.get("NuGet").is_some());
        assert!(!session.registry.get("CKSetup").unwrap().is_installable());
        assert_eq!(session.savor_context.name(), "Savors");
    }

    #[test]
    fn test_modify_saves_only_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.db");
        let session = session(&path);

        session
            .modify(|shared| Ok(shared.snapshot().serial_number()))
            .unwrap();
        assert!(!path.exists());

        let changed: ChangedInfo = session
            .modify(|shared| {
                let feed = pkgdb_core::Artifact::parse(&session.registry, "NuGet:Main")?;
                Ok(shared.update(|db| Ok(db.drop_feed(session.sink(), &feed)))?)
            })
            .unwrap();
        assert!(!changed.has_changes());
        assert!(!path.exists());

        let time = chrono::Utc::now();
        session
            .modify(|shared| Ok(shared.touch(time)))
            .unwrap();
        let db = session.load().unwrap();
        assert_eq!(db.serial_number(), 1);
        assert_eq!(db.last_update(), time);
    }
}
