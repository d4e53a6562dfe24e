use std::fs;

use chrono::Utc;
use nu_ansi_term::Color::{Blue, Cyan, Green, Red, Yellow};
use pkgdb_core::{
    info::parse_records, Artifact, ChangedInfo, PackageEventKind, PackageInfo,
};
use tracing::{debug, info};

use crate::{
    error::{CliError, CliResult},
    session::Session,
    utils::{format_time, Colored},
};

fn change_label(kind: PackageEventKind) -> Colored<&'static str> {
    if kind.contains(PackageEventKind::ADDED) {
        Colored(Green, "added")
    } else if kind.contains(PackageEventKind::CONTENT_CHANGED) {
        Colored(Yellow, "updated")
    } else {
        Colored(Blue, "state changed")
    }
}

fn report(changed: &ChangedInfo) {
    for change in &changed.package_changes {
        debug!("{} {}", change_label(change.kind), change.instance);
    }
    for feed in &changed.new_feeds {
        info!("{} {}", Colored(Green, "new feed"), feed);
    }
    for change in &changed.feed_changes {
        info!(
            "{} {}: +{} ~{} -{}",
            Colored(Cyan, "feed"),
            change.feed.typed_name(),
            change.added.len(),
            change.updated.len(),
            change.removed.len()
        );
    }
    for feed in &changed.dropped_feeds {
        info!("{} {}", Colored(Red, "dropped feed"), feed.typed_name());
    }
    info!("{}", changed.summary());
}

/// Reads package records from `path` and resolves them against the registry.
pub fn read_batch(session: &Session, path: &str) -> CliResult<Vec<PackageInfo>> {
    let content = fs::read_to_string(path)
        .map_err(|err| CliError::Custom(format!("failed to read {path}: {err}")))?;
    let records = parse_records(&content)?;
    debug!(file = path, records = records.len(), "parsed package records");

    records
        .into_iter()
        .map(|record| Ok(record.into_info(&session.registry, &session.savor_context)?))
        .collect()
}

pub fn import_files(session: &Session, files: &[String]) -> CliResult<()> {
    session.modify(|shared| {
        for path in files {
            let batch = read_batch(session, path)?;
            let changed = shared.update(|db| db.add(session.sink(), &batch))?;
            if changed.has_changes() {
                info!(
                    "Imported {} ({} new package(s))",
                    Colored(Blue, path),
                    changed.added().count()
                );
                report(&changed);
            } else {
                info!("{} brings no changes", Colored(Blue, path));
            }
        }
        Ok(())
    })
}

pub fn drop_feed(session: &Session, feed: &str) -> CliResult<()> {
    let artifact = Artifact::parse(&session.registry, feed)?;
    session.modify(|shared| {
        let changed = shared.update(|db| Ok(db.drop_feed(session.sink(), &artifact)))?;
        if changed.dropped_feeds.is_empty() {
            return Err(CliError::FeedNotFound(feed.to_string()));
        }
        report(&changed);
        Ok(())
    })
}

pub fn touch(session: &Session) -> CliResult<()> {
    let now = Utc::now();
    session.modify(|shared| {
        let db = shared.touch(now);
        info!(
            "Database #{} last updated {}",
            Colored(Cyan, db.serial_number()),
            format_time(db.last_update())
        );
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pkgdb_config::config::Config;
    use pkgdb_events::NullSink;
    use tempfile::{tempdir, TempDir};

    use super::*;

    fn setup() -> (TempDir, Session) {
        let dir = tempdir().unwrap();
        let db = dir.path().join("packages.db");
        let session =
            Session::new(Config::default_config(), db.to_str(), Arc::new(NullSink)).unwrap();
        (dir, session)
    }

    fn write_batch(dir: &TempDir, name: &str, json: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, json).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_import_and_drop_feed() {
        let (dir, session) = setup();
        let first = write_batch(
            &dir,
            "first.json",
            r#"[
                {"key": "NuGet:Lib/2.0.0", "feeds": ["NuGet:Main"], "savors": "net8|net48"},
                {"key": "NuGet:App/1.0.0", "feeds": ["NuGet:Main"],
                 "dependencies": [{"target": "NuGet:Lib/2.0.0"}]}
            ]"#,
        );
        let second = write_batch(
            &dir,
            "second.json",
            r#"[{"key": "NuGet:Lib/2.1.0", "feeds": ["NuGet:Preview"]}]"#,
        );

        import_files(&session, &[first, second]).unwrap();
        let db = session.load().unwrap();
        assert_eq!(db.serial_number(), 2);
        assert_eq!(db.instances().len(), 3);
        assert_eq!(db.feed_count(), 2);

        drop_feed(&session, "NuGet:Preview").unwrap();
        let db = session.load().unwrap();
        assert_eq!(db.feed_count(), 1);
        assert_eq!(db.instances().len(), 3);

        assert!(matches!(
            drop_feed(&session, "NuGet:Preview"),
            Err(CliError::FeedNotFound(_))
        ));
    }

    #[test]
    fn test_rejected_import_leaves_file_untouched() {
        let (dir, session) = setup();
        let good = write_batch(&dir, "good.json", r#"[{"key": "NPM:left-pad/1.0.0"}]"#);
        import_files(&session, &[good]).unwrap();
        let before = fs::read(&session.db_path).unwrap();

        let bad = write_batch(
            &dir,
            "bad.json",
            r#"[{"key": "NPM:app/1.0.0", "dependencies": [{"target": "NPM:missing/1.0.0"}]}]"#,
        );
        assert!(import_files(&session, &[bad]).is_err());
        assert_eq!(fs::read(&session.db_path).unwrap(), before);
    }

    #[test]
    fn test_touch_bumps_serial() {
        let (_dir, session) = setup();
        touch(&session).unwrap();
        assert_eq!(session.load().unwrap().serial_number(), 1);
    }
}
