use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed, Magenta, Yellow};
use pkgdb_core::{Artifact, ArtifactInstance, PackageDatabase, PackageInstance, Reference};
use tabled::{builder::Builder, settings::Panel};
use tracing::{debug, info};

use crate::{
    error::{CliError, CliResult},
    session::Session,
    utils::{apply_style, Colored},
};

fn render(session: &Session, builder: Builder, title: &str) -> String {
    let mut table = builder.build();
    table.with(Panel::header(title));
    apply_style(&mut table, session.config.display.table_style());
    table.to_string()
}

fn savors_cell(instance: &PackageInstance) -> String {
    instance
        .savors()
        .map(|savors| savors.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn dependency_row(db: &PackageDatabase, dep: &Reference) -> [String; 5] {
    let target = match db.resolve(dep) {
        Some(target) if target.is_ghost() => {
            format!("{} {}", dep.target, Colored(Yellow, "(ghost)"))
        }
        Some(_) => format!("{}", Colored(Blue, &dep.target)),
        None => format!("{} {}", dep.target, Colored(LightRed, "(missing)")),
    };
    [
        target,
        format!("{:?}", dep.lock),
        format!("{:?}", dep.min_quality),
        format!("{:?}", dep.kind),
        dep.applicable_savors
            .as_ref()
            .map(|savors| savors.to_string())
            .unwrap_or_else(|| "all".to_string()),
    ]
}

pub fn find_package(session: &Session, db: &PackageDatabase, key: &str, ghost: bool) -> CliResult<()> {
    let key = ArtifactInstance::parse(&session.registry, key)?;
    let instance = db
        .find(&key, ghost)
        .ok_or_else(|| CliError::NotFound(key.to_string()))?;
    debug!(package = %key, ghost = instance.is_ghost(), "found package");

    info!("{}", Colored(Cyan, instance));
    let feeds: Vec<String> = db
        .feeds()
        .filter(|feed| feed.contains(&key))
        .map(|feed| feed.typed_name())
        .collect();
    info!(
        "Feeds: {}",
        if feeds.is_empty() {
            "-".to_string()
        } else {
            feeds.join(", ")
        }
    );

    if !instance.dependencies().is_empty() {
        let mut builder = Builder::new();
        builder.push_record(["Dependency", "Lock", "Min quality", "Kind", "Savors"]);
        for dep in instance.dependencies() {
            builder.push_record(dependency_row(db, dep));
        }
        info!("\n{}", render(session, builder, "Dependencies"));
    }

    let dependents = db.dependents_of(&key);
    if !dependents.is_empty() {
        info!(
            "Required by: {}",
            dependents
                .iter()
                .map(|dependent| dependent.key().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

pub fn list_versions(session: &Session, db: &PackageDatabase, name: &str) -> CliResult<()> {
    let artifact = Artifact::parse(&session.registry, name)?;
    let available = db.available_versions(&artifact);
    if available.is_empty() {
        return Err(CliError::NotFound(artifact.to_string()));
    }

    let mut builder = Builder::new();
    builder.push_record(["Feed", "Versions"]);
    for entry in &available {
        let versions: Vec<String> = entry
            .versions
            .iter()
            .map(|instance| instance.key().version().to_string())
            .collect();
        builder.push_record([
            format!("{}", Colored(Green, entry.feed.typed_name())),
            versions.join(", "),
        ]);
    }
    info!("\n{}", render(session, builder, &artifact.to_string()));
    Ok(())
}

pub fn list_packages(session: &Session, db: &PackageDatabase, filter: Option<&str>) -> CliResult<()> {
    let instances = match filter {
        None => db.instances().as_slice(),
        Some(filter) if filter.contains(':') => {
            db.instances_of(&Artifact::parse(&session.registry, filter)?)
        }
        Some(filter) => db.instances_of_type(&session.registry.require(filter)?),
    };

    if instances.is_empty() {
        info!("No packages found");
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(["Package", "Version", "Savors", "Deps", "State"]);
    for instance in instances {
        builder.push_record([
            format!("{}", Colored(Blue, instance.key().artifact())),
            format!("{}", Colored(LightRed, instance.key().version())),
            savors_cell(instance),
            instance.dependencies().len().to_string(),
            if instance.is_ghost() {
                format!("{}", Colored(Yellow, "ghost"))
            } else {
                String::new()
            },
        ]);
    }
    info!(
        "\n{}",
        render(session, builder, &format!("Packages ({})", instances.len()))
    );
    Ok(())
}

pub fn list_feeds(session: &Session, db: &PackageDatabase) -> CliResult<()> {
    if db.feed_count() == 0 {
        info!("No feeds found");
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(["Feed", "Type", "Packages"]);
    for feed in db.feeds() {
        builder.push_record([
            format!("{}", Colored(Green, feed.name())),
            format!("{}", Colored(Magenta, feed.artifact_type())),
            feed.instances().len().to_string(),
        ]);
    }
    info!("\n{}", render(session, builder, "Feeds"));
    Ok(())
}
