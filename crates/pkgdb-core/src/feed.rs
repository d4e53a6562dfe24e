//! Feeds: named subsets of the global store.

use std::{fmt, sync::Arc};

use crate::{
    artifact::{Artifact, ArtifactInstance, ArtifactType},
    changed::FeedChangedInfo,
    instance::PackageInstance,
    store::{InstanceStore, StoreOp},
};

/// What one source currently publishes for one artifact type.
///
/// The instances are the very objects held by the owning database store at
/// the time the feed was built.
#[derive(Debug, Clone)]
pub struct PackageFeed {
    artifact: Artifact,
    instances: InstanceStore,
}

impl PackageFeed {
    pub(crate) fn new(artifact: Artifact, instances: InstanceStore) -> Self {
        Self {
            artifact,
            instances,
        }
    }

    /// The feed identity (`Type:Name`).
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn artifact_type(&self) -> &ArtifactType {
        self.artifact.artifact_type()
    }

    pub fn name(&self) -> &str {
        self.artifact.name()
    }

    pub fn typed_name(&self) -> String {
        self.artifact.typed_name()
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn contains(&self, key: &ArtifactInstance) -> bool {
        self.instances.contains(key)
    }

    /// Versions of one artifact published by this feed.
    pub fn versions_of(&self, artifact: &Artifact) -> &[Arc<PackageInstance>] {
        self.instances.instances_of(artifact)
    }
}

impl fmt::Display for PackageFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} instances)", self.artifact, self.instances.len())
    }
}

/// Edits accumulated for one existing feed during a transaction, applied
/// in a single rebuild by [`compile`](Self::compile).
pub(crate) struct FeedDiff {
    feed: Arc<PackageFeed>,
    ops: Vec<StoreOp>,
    added: Vec<Arc<PackageInstance>>,
    updated: Vec<Arc<PackageInstance>>,
    removed: Vec<Arc<PackageInstance>>,
}

impl FeedDiff {
    pub fn new(feed: Arc<PackageFeed>) -> Self {
        Self {
            feed,
            ops: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Adds the instance, or refreshes the feed copy when it holds another
    /// object for the same key.
    pub fn add_or_update(&mut self, instance: &Arc<PackageInstance>) {
        match self.feed.instances.find(instance.key()) {
            Ok(at) => {
                if !Arc::ptr_eq(&self.feed.instances.as_slice()[at], instance) {
                    self.ops.push(StoreOp::Update {
                        at,
                        instance: instance.clone(),
                    });
                    self.updated.push(instance.clone());
                }
            }
            Err(at) => {
                self.ops.push(StoreOp::Insert {
                    at,
                    instance: instance.clone(),
                });
                self.added.push(instance.clone());
            }
        }
    }

    pub fn remove(&mut self, key: &ArtifactInstance) {
        if let Ok(at) = self.feed.instances.find(key) {
            self.ops.push(StoreOp::Delete { at });
            self.removed
                .push(self.feed.instances.as_slice()[at].clone());
        }
    }

    /// Builds the new feed, or `None` when nothing was changed.
    pub fn compile(self) -> Option<FeedChangedInfo> {
        if self.ops.is_empty() {
            return None;
        }
        let instances = self.feed.instances.apply(self.ops);
        let feed = Arc::new(PackageFeed::new(self.feed.artifact.clone(), instances));
        Some(FeedChangedInfo {
            previous: self.feed,
            feed,
            added: self.added,
            updated: self.updated,
            removed: self.removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{artifact, instance, key};

    fn feed(keys: &[&str]) -> Arc<PackageFeed> {
        Arc::new(PackageFeed::new(
            artifact("NuGet:Main"),
            InstanceStore::new().add(keys.iter().map(|k| instance(k, &[]))),
        ))
    }

    #[test]
    fn test_untouched_diff_compiles_to_nothing() {
        let feed = feed(&["NuGet:A/1.0.0"]);
        let mut diff = FeedDiff::new(feed.clone());
        diff.add_or_update(&feed.instances().as_slice()[0].clone());
        diff.remove(&key("NuGet:Missing/1.0.0"));
        assert!(diff.compile().is_none());
    }

    #[test]
    fn test_diff_rebuilds_once() {
        let feed = feed(&["NuGet:A/1.0.0", "NuGet:B/1.0.0"]);
        let mut diff = FeedDiff::new(feed.clone());
        diff.remove(&key("NuGet:A/1.0.0"));
        diff.add_or_update(&instance("NuGet:B/1.0.0", &["NuGet:C/1.0.0"]));
        diff.add_or_update(&instance("NuGet:C/1.0.0", &[]));

        let changed = diff.compile().unwrap();
        assert!(Arc::ptr_eq(&changed.previous, &feed));
        assert_eq!(changed.removed.len(), 1);
        assert_eq!(changed.updated.len(), 1);
        assert_eq!(changed.added.len(), 1);

        let keys: Vec<_> = changed
            .feed
            .instances()
            .iter()
            .map(|i| i.key().to_string())
            .collect();
        assert_eq!(keys, vec!["NuGet:B/1.0.0", "NuGet:C/1.0.0"]);
        assert_eq!(feed.instances().len(), 2);
        assert_eq!(changed.feed.to_string(), "NuGet:Main (2 instances)");
    }

    #[test]
    fn test_versions_of() {
        let feed = feed(&["NuGet:A/1.0.0", "NuGet:A/2.0.0", "NuGet:B/1.0.0"]);
        assert_eq!(feed.versions_of(&artifact("NuGet:a")).len(), 2);
        assert!(feed.contains(&key("NuGet:B/1.0.0")));
        assert_eq!(feed.typed_name(), "NuGet:Main");
    }
}
