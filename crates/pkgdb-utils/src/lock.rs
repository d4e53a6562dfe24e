//! File-based locking for serialising snapshot writers.
//!
//! A `.lock` file per resource ensures that only one process at a time runs a
//! read-modify-write cycle on a given package database file.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use nix::fcntl::{Flock, FlockArg};

use crate::error::{LockError, LockResult};

/// A file-based lock using `flock`.
///
/// The lock is released when `FileLock` is dropped.
pub struct FileLock {
    _file: Flock<File>,
    path: PathBuf,
}

impl FileLock {
    /// Uses `$XDG_RUNTIME_DIR/pkgdb/locks`, or the temp dir when unset.
    fn lock_dir() -> LockResult<PathBuf> {
        let base = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        let lock_dir = base.join("pkgdb").join("locks");
        if !lock_dir.exists() {
            fs::create_dir_all(&lock_dir)?;
        }

        Ok(lock_dir)
    }

    fn lock_path(name: &str) -> LockResult<PathBuf> {
        let sanitized: String = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        Ok(Self::lock_dir()?.join(format!("{sanitized}.lock")))
    }

    fn open(lock_path: &Path) -> LockResult<File> {
        Ok(OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?)
    }

    /// Acquire an exclusive lock named `name`, blocking until it is available.
    pub fn acquire(name: &str) -> LockResult<Self> {
        let lock_path = Self::lock_path(name)?;
        let file = Self::open(&lock_path)?;

        let file = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, err)| {
            LockError::AcquireFailed(format!("{}: {}", lock_path.display(), err))
        })?;

        Ok(FileLock {
            path: lock_path,
            _file: file,
        })
    }

    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Returns `None` if the lock is already held.
    pub fn try_acquire(name: &str) -> LockResult<Option<Self>> {
        let lock_path = Self::lock_path(name)?;
        let file = Self::open(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(FileLock {
                    path: lock_path,
                    _file: file,
                }))
            }
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, err)) => {
                Err(LockError::AcquireFailed(format!(
                    "{}: {}",
                    lock_path.display(),
                    err
                )))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn test_lock_path_sanitization() {
        let path = FileLock::lock_path("/var/lib/pkgdb/packages.db").unwrap();
        assert!(path
            .to_string_lossy()
            .ends_with("_var_lib_pkgdb_packages.db.lock"));
    }

    #[test]
    fn test_exclusive_lock() {
        let lock1 = FileLock::acquire("pkgdb-test-exclusive").unwrap();

        let lock2 = FileLock::try_acquire("pkgdb-test-exclusive").unwrap();
        assert!(lock2.is_none(), "Should not be able to acquire lock");

        drop(lock1);

        let lock3 = FileLock::try_acquire("pkgdb-test-exclusive").unwrap();
        assert!(lock3.is_some(), "Should acquire the lock after release");
    }

    #[test]
    fn test_lock_blocks_until_released() {
        let lock1 = FileLock::acquire("pkgdb-test-block").unwrap();
        let path = lock1.path().to_path_buf();

        let handle = thread::spawn(move || {
            let lock2 = FileLock::acquire("pkgdb-test-block").unwrap();
            assert_eq!(lock2.path(), &path);
        });

        thread::sleep(Duration::from_millis(100));
        drop(lock1);

        handle.join().unwrap();
    }
}
