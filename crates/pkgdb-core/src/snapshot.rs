//! Snapshot files: the binary format plus optional zstd compression.

use std::{fs, io::Write, path::Path, sync::Arc};

use pkgdb_events::{DbEvent, EventSink, LogLevel, SnapshotStage};
use pkgdb_utils::fs::write_atomic;
use tracing::{debug, info};

use crate::{
    artifact::ArtifactTypeRegistry,
    database::PackageDatabase,
    error::{ErrorContext, Result},
};

/// Leading bytes of a zstd frame.
pub const ZST_MAGIC_BYTES: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Writes `db` to `path`, replacing any previous file atomically.
///
/// Returns the number of bytes written.
pub fn save<P: AsRef<Path>>(
    db: &PackageDatabase,
    path: P,
    compress: bool,
    sink: &dyn EventSink,
) -> Result<u64> {
    let path = path.as_ref();
    let mut encoded = Vec::new();
    db.write_to(&mut encoded)?;

    let bytes = if compress {
        zstd::encode_all(encoded.as_slice(), 0)
            .with_context(|| format!("compressing snapshot {}", path.display()))?
    } else {
        encoded
    };
    write_atomic(path, |file| file.write_all(&bytes))?;

    let size = bytes.len() as u64;
    info!(
        path = %path.display(),
        serial_number = db.serial_number(),
        bytes = size,
        compressed = compress,
        "saved package database"
    );
    sink.emit(DbEvent::Snapshot {
        serial_number: db.serial_number(),
        stage: SnapshotStage::Saved {
            bytes: size,
            compressed: compress,
        },
    });
    Ok(size)
}

/// Reads a snapshot file, compressed or not.
pub fn load<P: AsRef<Path>>(
    registry: &ArtifactTypeRegistry,
    path: P,
    sink: &dyn EventSink,
) -> Result<Arc<PackageDatabase>> {
    let path = path.as_ref();
    let content =
        fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;

    let db = if content.starts_with(&ZST_MAGIC_BYTES) {
        debug!(path = %path.display(), "snapshot is zstd compressed");
        let decoded = zstd::decode_all(content.as_slice())
            .with_context(|| format!("decompressing snapshot {}", path.display()))?;
        PackageDatabase::read_from(registry, decoded.as_slice())?
    } else {
        PackageDatabase::read_from(registry, content.as_slice())?
    };

    debug!(
        path = %path.display(),
        serial_number = db.serial_number(),
        instances = db.instances().len(),
        feeds = db.feed_count(),
        "loaded package database"
    );
    sink.emit(DbEvent::Snapshot {
        serial_number: db.serial_number(),
        stage: SnapshotStage::Loaded {
            instances: db.instances().len(),
            feeds: db.feed_count(),
        },
    });
    Ok(Arc::new(db))
}

/// Like [`load`], but a missing file yields [`PackageDatabase::empty`].
pub fn load_or_empty<P: AsRef<Path>>(
    registry: &ArtifactTypeRegistry,
    path: P,
    sink: &dyn EventSink,
) -> Result<Arc<PackageDatabase>> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot yet, starting empty");
        sink.emit(DbEvent::Log {
            level: LogLevel::Info,
            message: format!("no package database at {}, starting empty", path.display()),
        });
        return Ok(PackageDatabase::empty());
    }
    load(registry, path, sink)
}

#[cfg(test)]
mod tests {
    use pkgdb_events::{CollectorSink, NullSink};
    use tempfile::tempdir;

    use super::*;
    use crate::{
        error::{DatabaseError, FormatError},
        test_utils::{info, key},
    };

    fn sample() -> Arc<PackageDatabase> {
        PackageDatabase::empty()
            .add(
                &NullSink,
                [
                    info("NuGet:Bar/1.0.0", &[], &["NuGet:Main"]),
                    info("NuGet:Foo/1.0.0", &["NuGet:Bar/1.0.0"], &["NuGet:Main"]),
                ],
            )
            .unwrap()
            .db
    }

    #[test]
    fn test_save_and_load_compressed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("packages.db");
        let sink = CollectorSink::default();

        let written = save(&sample(), &path, true, &sink).unwrap();
        let content = fs::read(&path).unwrap();
        assert_eq!(content.len() as u64, written);
        assert!(content.starts_with(&ZST_MAGIC_BYTES));

        let registry = ArtifactTypeRegistry::new();
        let db = load(&registry, &path, &sink).unwrap();
        assert_eq!(db.instances().len(), 2);
        assert_eq!(db.serial_number(), 1);
        assert!(db.find(&key("NuGet:Foo/1.0.0"), false).is_some());

        let events = sink.events();
        assert!(matches!(
            events[0],
            DbEvent::Snapshot {
                stage: SnapshotStage::Saved {
                    compressed: true,
                    ..
                },
                ..
            }
        ));
        assert!(matches!(
            events[1],
            DbEvent::Snapshot {
                stage: SnapshotStage::Loaded {
                    instances: 2,
                    feeds: 1
                },
                ..
            }
        ));
    }

    #[test]
    fn test_save_and_load_plain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packages.db");
        save(&sample(), &path, false, &NullSink).unwrap();
        assert!(!fs::read(&path).unwrap().starts_with(&ZST_MAGIC_BYTES));

        let db = load(&ArtifactTypeRegistry::new(), &path, &NullSink).unwrap();
        assert_eq!(db.feed_count(), 1);
    }

    #[test]
    fn test_load_or_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let sink = CollectorSink::default();
        let db = load_or_empty(&ArtifactTypeRegistry::new(), &path, &sink).unwrap();
        assert!(Arc::ptr_eq(&db, &PackageDatabase::empty()));
        assert!(matches!(
            sink.events()[0],
            DbEvent::Log {
                level: LogLevel::Info,
                ..
            }
        ));

        let err = load(&ArtifactTypeRegistry::new(), &path, &NullSink).unwrap_err();
        assert!(matches!(err, DatabaseError::IoError { .. }));
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        fs::write(&path, [9u8, 0, 0]).unwrap();
        let err = load(&ArtifactTypeRegistry::new(), &path, &NullSink).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Format(FormatError::UnsupportedVersion { found: 9, .. })
        ));
    }
}
