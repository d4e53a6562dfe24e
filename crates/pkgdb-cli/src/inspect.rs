use std::{collections::BTreeMap, fs, path::Path};

use chrono::{DateTime, Utc};
use nu_ansi_term::Color::{Cyan, Green, Magenta, Yellow};
use pkgdb_config::config::generate_default_config;
use pkgdb_core::{snapshot::ZST_MAGIC_BYTES, PackageDatabase};
use pkgdb_utils::bytes::format_bytes;
use tabled::{builder::Builder, settings::Panel};
use tracing::{info, warn};

use crate::{
    error::CliResult,
    session::Session,
    utils::{apply_style, format_time, Colored},
};

/// Whether `last_update` is older than the configured `stale_after`.
pub fn is_stale(db: &PackageDatabase, now: DateTime<Utc>, stale_after: std::time::Duration) -> bool {
    match (now - db.last_update()).to_std() {
        Ok(age) => age > stale_after,
        Err(_) => false,
    }
}

pub fn inspect_database(session: &Session, db: &PackageDatabase) -> CliResult<()> {
    let file = fs::read(&session.db_path).ok();

    let mut per_type: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for instance in db.instances() {
        let entry = per_type
            .entry(instance.key().artifact_type().to_string())
            .or_default();
        if instance.is_ghost() {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    let mut builder = Builder::new();
    builder.push_record(["Path".to_string(), session.db_path.display().to_string()]);
    builder.push_record([
        "Size".to_string(),
        match &file {
            Some(bytes) => {
                format!(
                    "{}{}",
                    Colored(Magenta, format_bytes(bytes.len() as u64, 2)),
                    if bytes.starts_with(&ZST_MAGIC_BYTES) {
                        " (zstd)"
                    } else {
                        ""
                    }
                )
            }
            None => "not saved yet".to_string(),
        },
    ]);
    builder.push_record([
        "Serial".to_string(),
        format!("{}", Colored(Cyan, db.serial_number())),
    ]);
    builder.push_record(["Last update".to_string(), format_time(db.last_update())]);
    builder.push_record(["Instances".to_string(), db.instances().len().to_string()]);
    builder.push_record(["Feeds".to_string(), db.feed_count().to_string()]);
    for (ty, (packages, ghosts)) in &per_type {
        builder.push_record([
            format!("  {}", Colored(Green, ty)),
            format!("{packages} package(s), {ghosts} ghost(s)"),
        ]);
    }

    let mut table = builder.build();
    table.with(Panel::header("Package Database"));
    apply_style(&mut table, session.config.display.table_style());
    info!("\n{table}");

    if db.serial_number() > 0 && is_stale(db, Utc::now(), session.config.stale_after()) {
        warn!(
            "Database was last updated {}, older than {}",
            format_time(db.last_update()),
            session.config.stale_after.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

pub fn show_config(session: &Session, path: &Path) -> CliResult<()> {
    let doc = session.config.to_annotated_document()?;
    info!("{} {}\n{}", Colored(Yellow, "#"), path.display(), doc);
    Ok(())
}

pub fn init_config(path: &Path) -> CliResult<()> {
    generate_default_config(path)?;
    info!("Default configuration written to {}", Colored(Green, path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_is_stale() {
        let stamped = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let db = PackageDatabase::empty().with_last_update(stamped);
        let week = Duration::from_secs(7 * 24 * 60 * 60);

        let soon = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert!(!is_stale(&db, soon, week));

        let later = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(is_stale(&db, later, week));

        let earlier = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
        assert!(!is_stale(&db, earlier, week));
    }
}
