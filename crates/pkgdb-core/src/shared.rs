//! Publishing the current snapshot to concurrent readers.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::{changed::ChangedInfo, database::PackageDatabase, error::Result};

/// Holds the current root of a database history.
///
/// Readers take cheap [`snapshot`](Self::snapshot)s and query them without
/// further locking. Writers are serialised: each [`update`](Self::update)
/// runs against the latest published root.
pub struct SharedDatabase {
    current: RwLock<Arc<PackageDatabase>>,
    writer: Mutex<()>,
}

impl Default for SharedDatabase {
    fn default() -> Self {
        Self::new(PackageDatabase::empty())
    }
}

impl SharedDatabase {
    pub fn new(db: Arc<PackageDatabase>) -> Self {
        Self {
            current: RwLock::new(db),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<PackageDatabase> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, db: &Arc<PackageDatabase>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = db.clone();
    }

    /// Runs `mutation` on the current root and publishes its result.
    ///
    /// An error leaves the published root untouched.
    pub fn update<F>(&self, mutation: F) -> Result<ChangedInfo>
    where
        F: FnOnce(&Arc<PackageDatabase>) -> Result<ChangedInfo>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();
        let changed = mutation(&base)?;
        if !Arc::ptr_eq(&changed.db, &base) {
            self.publish(&changed.db);
        }
        Ok(changed)
    }

    /// Publishes the current root stamped with `time`.
    pub fn touch(&self, time: DateTime<Utc>) -> Arc<PackageDatabase> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let db = self.snapshot().with_last_update(time);
        self.publish(&db);
        db
    }
}
