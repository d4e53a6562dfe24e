use std::sync::{Arc, LazyLock};

use crate::{
    artifact::{Artifact, ArtifactInstance, ArtifactTypeRegistry},
    info::PackageInfo,
    instance::{PackageInstance, PackageState, Reference},
};

pub static REGISTRY: LazyLock<ArtifactTypeRegistry> = LazyLock::new(|| {
    let registry = ArtifactTypeRegistry::new();
    registry.register("NuGet", true).unwrap();
    registry.register("NPM", true).unwrap();
    registry.register("CKSetup", false).unwrap();
    registry
});

pub fn key(s: &str) -> ArtifactInstance {
    ArtifactInstance::parse(&REGISTRY, s).unwrap()
}

pub fn artifact(s: &str) -> Artifact {
    Artifact::parse(&REGISTRY, s).unwrap()
}

pub fn instance(s: &str, deps: &[&str]) -> Arc<PackageInstance> {
    Arc::new(PackageInstance::new(
        key(s),
        None,
        PackageState::empty(),
        deps.iter().map(|d| Reference::new(key(d))),
    ))
}

/// A batch entry declaring an exhaustive feed list.
pub fn info(s: &str, deps: &[&str], feeds: &[&str]) -> PackageInfo {
    PackageInfo::new(key(s))
        .with_dependencies(deps.iter().map(|d| Reference::new(key(d))))
        .with_feeds(feeds.iter().copied(), true)
}
