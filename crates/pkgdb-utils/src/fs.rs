use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| {
            FileSystemError::Directory {
                path: path.to_path_buf(),
                action: "create",
                source: err,
            }
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory, succeeding if it does not exist.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source: err,
        }
    })
}

/// Writes a file by filling a sibling temporary file and renaming it over the target.
///
/// Readers never observe a partially written file: they either see the previous content or
/// the complete new one. The parent directory is created when missing.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the parent directory cannot be created.
/// * [`FileSystemError::File`] if the temporary file cannot be written or renamed.
pub fn write_atomic<P, F>(path: P, fill: F) -> FileSystemResult<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir_exists(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp_path = Path::new(&tmp_name);

    let file_error = |action, err| {
        FileSystemError::File {
            path: tmp_path.to_path_buf(),
            action,
            source: err,
        }
    };

    let mut file = File::create(tmp_path).map_err(|err| file_error("create", err))?;
    if let Err(err) = fill(&mut file)
        .and_then(|_| file.flush())
        .and_then(|_| file.sync_all())
    {
        drop(file);
        let _ = safe_remove(tmp_path);
        return Err(file_error("write", err));
    }
    drop(file);

    fs::rename(tmp_path, path).map_err(|err| {
        let _ = safe_remove(tmp_path);
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "replace",
            source: err,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_safe_remove_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("packages.db");
        fs::write(&file_path, "snapshot").unwrap();
        safe_remove(&file_path).unwrap();
        assert!(!file_path.exists());
    }

    #[test]
    fn test_safe_remove_non_existent() {
        let dir = tempdir().unwrap();
        safe_remove(dir.path().join("missing.db")).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("data/pkgdb");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
        ensure_dir_exists(&new_dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_write_atomic_creates_parent_and_replaces() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested/packages.db");

        write_atomic(&target, |file| file.write_all(b"first")).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");

        write_atomic(&target, |file| file.write_all(b"second")).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");

        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_atomic_failure_keeps_previous_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("packages.db");
        fs::write(&target, "previous").unwrap();

        let result = write_atomic(&target, |_| Err(io::Error::other("encoder failed")));
        assert!(matches!(
            result,
            Err(FileSystemError::File {
                action: "write",
                ..
            })
        ));
        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
    }
}
