//! The root immutable snapshot and its transactions.

use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    fmt,
    sync::{Arc, LazyLock},
};

use chrono::{DateTime, Utc};
use pkgdb_events::{DbEvent, EventSink, RejectReason};
use tracing::{debug, trace, warn};

use crate::{
    artifact::{compare_names, Artifact, ArtifactInstance, ArtifactType},
    changed::{ChangedInfo, FeedChangedInfo, PackageChangedInfo, PackageEventKind},
    error::{DatabaseError, Result},
    feed::{FeedDiff, PackageFeed},
    info::FullPackageInfo,
    instance::{PackageInstance, PackageState, Reference},
    savors::Savors,
    store::{InstanceStore, StoreOp},
};

static EMPTY: LazyLock<Arc<PackageDatabase>> = LazyLock::new(|| {
    Arc::new(PackageDatabase {
        instances: InstanceStore::new(),
        feeds: BTreeMap::new(),
        last_update: DateTime::<Utc>::UNIX_EPOCH,
        serial_number: 0,
    })
});

/// Versions of an artifact published by one feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedVersions<'a> {
    pub feed: &'a Arc<PackageFeed>,
    pub versions: &'a [Arc<PackageInstance>],
}

/// An immutable snapshot of every known package instance and feed.
///
/// Mutations never touch the snapshot they are called on: they return a new
/// one through [`ChangedInfo::db`], sharing every untouched instance and feed.
#[derive(Clone)]
pub struct PackageDatabase {
    instances: InstanceStore,
    feeds: BTreeMap<Artifact, Arc<PackageFeed>>,
    last_update: DateTime<Utc>,
    serial_number: u64,
}

/// One package of an `add` batch after validation.
struct Candidate {
    state: PackageState,
    savors: Option<Savors>,
    dependencies: Vec<Reference>,
    feeds: BTreeSet<Artifact>,
    all_feeds_known: bool,
}

impl PackageDatabase {
    /// The shared root of every history.
    pub fn empty() -> Arc<Self> {
        EMPTY.clone()
    }

    pub(crate) fn from_parts(
        instances: InstanceStore,
        feeds: impl IntoIterator<Item = PackageFeed>,
        last_update: DateTime<Utc>,
        serial_number: u64,
    ) -> Self {
        Self {
            instances,
            feeds: feeds
                .into_iter()
                .map(|feed| (feed.artifact().clone(), Arc::new(feed)))
                .collect(),
            last_update,
            serial_number,
        }
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    /// Looks an instance up by key. Ghosts are skipped unless `allow_ghost`.
    pub fn find(&self, key: &ArtifactInstance, allow_ghost: bool) -> Option<&Arc<PackageInstance>> {
        self.instances
            .get_by_key(key)
            .filter(|instance| allow_ghost || !instance.is_ghost())
    }

    pub fn instances_of_type(&self, ty: &ArtifactType) -> &[Arc<PackageInstance>] {
        self.instances.instances_of_type(ty)
    }

    pub fn instances_of(&self, artifact: &Artifact) -> &[Arc<PackageInstance>] {
        self.instances.instances_of(artifact)
    }

    /// The target of a dependency edge in this snapshot.
    pub fn resolve(&self, reference: &Reference) -> Option<&Arc<PackageInstance>> {
        self.instances.resolve(reference)
    }

    /// Instances with a dependency on `key`. Scans the whole store.
    pub fn dependents_of(&self, key: &ArtifactInstance) -> Vec<&Arc<PackageInstance>> {
        self.instances
            .iter()
            .filter(|instance| instance.dependencies().iter().any(|d| &d.target == key))
            .collect()
    }

    /// Per feed of the artifact type, the versions of `artifact` it
    /// publishes. Feeds without any version are left out.
    pub fn available_versions(&self, artifact: &Artifact) -> Vec<FeedVersions<'_>> {
        self.feeds_of_type(artifact.artifact_type())
            .map(|feed| {
                FeedVersions {
                    feed,
                    versions: feed.versions_of(artifact),
                }
            })
            .filter(|fv| !fv.versions.is_empty())
            .collect()
    }

    pub fn find_feed(&self, feed: &Artifact) -> Option<&Arc<PackageFeed>> {
        self.feeds.get(feed)
    }

    /// Finds a feed from its `Type:Name` without a type registry.
    pub fn find_feed_by_name(&self, typed_name: &str) -> Option<&Arc<PackageFeed>> {
        let (type_name, name) = typed_name.split_once(':')?;
        let (type_name, name) = (type_name.trim(), name.trim());
        self.feeds.values().find(|feed| {
            feed.artifact_type().name() == type_name && compare_names(feed.name(), name).is_eq()
        })
    }

    pub fn feeds(&self) -> impl Iterator<Item = &Arc<PackageFeed>> {
        self.feeds.values()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn feeds_of_type(
        &self,
        ty: &ArtifactType,
    ) -> impl Iterator<Item = &Arc<PackageFeed>> + '_ {
        let ty = ty.clone();
        self.feeds
            .range(Artifact::lower_bound(&ty)..)
            .take_while(move |(artifact, _)| artifact.artifact_type() == &ty)
            .map(|(_, feed)| feed)
    }

    /// Applies a batch of packages in one transaction.
    ///
    /// A dependency target must be an earlier entry of the batch or an
    /// instance of this snapshot; a package never depends on itself. When a
    /// key appears more than once the last entry wins, and the result must
    /// still be free of cycles.
    /// Nothing is published on error: the batch is rejected as a whole and
    /// the rejection is reported to `sink`.
    ///
    /// When nothing changes, the returned [`ChangedInfo::db`] is this very
    /// snapshot and the serial number is not bumped.
    ///
    /// # Errors
    ///
    /// * [`DatabaseError::InvalidFeedName`] if a feed name is not `Type:Name`.
    /// * [`DatabaseError::FeedTypeMismatch`] if a feed type differs from the package type.
    /// * [`DatabaseError::InvalidApplicableSavors`] if a dependency applies to
    ///   none of the package savors.
    /// * [`DatabaseError::UnresolvedDependencies`] listing every missing target.
    /// * [`DatabaseError::DependencyCycle`] if a redefined key closes a loop.
    pub fn add<I>(self: &Arc<Self>, sink: &dyn EventSink, batch: I) -> Result<ChangedInfo>
    where
        I: IntoIterator,
        I::Item: FullPackageInfo,
    {
        let pending = self.collect_batch(batch).map_err(|err| reject(sink, err))?;
        if let Some(cycle) = self.find_cycle(&pending) {
            return Err(reject(sink, DatabaseError::DependencyCycle { cycle }));
        }

        let mut store_ops = Vec::new();
        let mut package_changes = Vec::new();
        let mut diffs: BTreeMap<Artifact, FeedDiff> = BTreeMap::new();
        let mut new_feeds: BTreeMap<Artifact, Vec<Arc<PackageInstance>>> = BTreeMap::new();

        for (key, candidate) in pending {
            let built = PackageInstance::new(
                key,
                candidate.savors,
                candidate.state,
                candidate.dependencies,
            );

            let (instance, previous) = match self.instances.find(built.key()) {
                Ok(at) => {
                    let previous = self.instances.as_slice()[at].clone();
                    let mut kind = PackageEventKind::empty();
                    if !previous.same_content(&built) {
                        kind |= PackageEventKind::CONTENT_CHANGED;
                        if !previous.is_ghost() && !built.is_ghost() {
                            warn!(
                                package = %built.key(),
                                "package content differs from the stored one, replacing it"
                            );
                            sink.emit(DbEvent::ContentMismatch {
                                package: built.key().to_string(),
                                stored: previous.content_summary(),
                                submitted: built.content_summary(),
                            });
                        }
                    }
                    if previous.state() != built.state() {
                        kind |= PackageEventKind::STATE_CHANGED;
                    }

                    if kind.is_empty() {
                        trace!(package = %built.key(), "unchanged");
                        (previous.clone(), Some(previous))
                    } else {
                        trace!(package = %built.key(), ?kind, "updated");
                        let instance = Arc::new(built);
                        store_ops.push(StoreOp::Update {
                            at,
                            instance: instance.clone(),
                        });
                        package_changes.push(PackageChangedInfo {
                            kind,
                            instance: instance.clone(),
                            previous: Some(previous.clone()),
                        });
                        (instance, Some(previous))
                    }
                }
                Err(at) => {
                    trace!(package = %built.key(), "added");
                    let instance = Arc::new(built);
                    store_ops.push(StoreOp::Insert {
                        at,
                        instance: instance.clone(),
                    });
                    package_changes.push(PackageChangedInfo {
                        kind: PackageEventKind::ADDED,
                        instance: instance.clone(),
                        previous: None,
                    });
                    (instance, None)
                }
            };

            let key = instance.key();
            if previous.is_some() {
                for feed in self.feeds_of_type(key.artifact_type()) {
                    if !feed.contains(key) {
                        continue;
                    }
                    let diff = diff_for(&mut diffs, feed);
                    if candidate.all_feeds_known && !candidate.feeds.contains(feed.artifact()) {
                        diff.remove(key);
                    } else {
                        diff.add_or_update(&instance);
                    }
                }
            }

            for feed_name in candidate.feeds {
                match self.feeds.get(&feed_name) {
                    Some(feed) => {
                        if !feed.contains(key) {
                            diff_for(&mut diffs, feed).add_or_update(&instance);
                        }
                    }
                    None => new_feeds.entry(feed_name).or_default().push(instance.clone()),
                }
            }
        }

        let feed_changes: Vec<FeedChangedInfo> =
            diffs.into_values().filter_map(FeedDiff::compile).collect();

        if store_ops.is_empty() && feed_changes.is_empty() && new_feeds.is_empty() {
            debug!(serial_number = self.serial_number, "batch left the database unchanged");
            return Ok(ChangedInfo::unchanged(self.clone()));
        }

        let mut feeds = self.feeds.clone();
        for change in &feed_changes {
            feeds.insert(change.feed.artifact().clone(), change.feed.clone());
        }
        let new_feeds: Vec<Arc<PackageFeed>> = new_feeds
            .into_iter()
            .map(|(artifact, members)| {
                Arc::new(PackageFeed::new(artifact, InstanceStore::from_sorted(members)))
            })
            .collect();
        for feed in &new_feeds {
            feeds.insert(feed.artifact().clone(), feed.clone());
        }

        let db = Arc::new(Self {
            instances: self.instances.apply(store_ops),
            feeds,
            last_update: self.last_update,
            serial_number: self.serial_number + 1,
        });

        let changed = ChangedInfo {
            db,
            package_changes,
            new_feeds,
            feed_changes,
            dropped_feeds: Vec::new(),
        };
        committed(sink, &changed);
        Ok(changed)
    }

    fn collect_batch<I>(&self, batch: I) -> Result<BTreeMap<ArtifactInstance, Candidate>>
    where
        I: IntoIterator,
        I::Item: FullPackageInfo,
    {
        let mut pending: BTreeMap<ArtifactInstance, Candidate> = BTreeMap::new();
        let mut missing = BTreeSet::new();
        for info in batch {
            let key = info.key();
            let savors = info.savors().cloned();
            for dep in info.dependencies() {
                let known = &dep.target != key
                    && (pending.contains_key(&dep.target) || self.instances.contains(&dep.target));
                if !known {
                    missing.insert(dep.target.to_string());
                }
                if let (Some(own), Some(applicable)) = (&savors, &dep.applicable_savors) {
                    if own.intersect(applicable).is_none() {
                        return Err(DatabaseError::InvalidApplicableSavors {
                            package: key.to_string(),
                            target: dep.target.to_string(),
                            savors: applicable.to_string(),
                        });
                    }
                }
            }

            let mut candidate = Candidate {
                state: info.state(),
                savors,
                dependencies: info.dependencies().to_vec(),
                feeds: parse_feeds(key, info.feed_names())?,
                all_feeds_known: info.all_feed_names_are_known(),
            };

            match pending.entry(key.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(candidate);
                }
                Entry::Occupied(mut entry) => {
                    trace!(package = %key, "duplicate in batch, last entry wins");
                    if !candidate.all_feeds_known {
                        candidate.feeds.extend(entry.get().feeds.iter().cloned());
                    }
                    entry.insert(candidate);
                }
            }
        }

        if !missing.is_empty() {
            return Err(DatabaseError::UnresolvedDependencies {
                missing: missing.into_iter().collect(),
            });
        }
        Ok(pending)
    }

    /// Depth-first search for a loop through the batch. The stored graph is
    /// acyclic, so any loop goes through a redefined key.
    fn find_cycle(&self, pending: &BTreeMap<ArtifactInstance, Candidate>) -> Option<Vec<String>> {
        let mut marks: BTreeMap<&ArtifactInstance, Mark> = BTreeMap::new();
        for root in pending.keys() {
            if marks.contains_key(root) {
                continue;
            }
            marks.insert(root, Mark::Active);
            let mut stack: Vec<(&ArtifactInstance, usize)> = vec![(root, 0)];

            while let Some(&(key, next)) = stack.last() {
                let Some(dep) = dependencies_in(&self.instances, pending, key).get(next) else {
                    marks.insert(key, Mark::Done);
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let target = &dep.target;
                match marks.get(target) {
                    Some(Mark::Done) => {}
                    Some(Mark::Active) => {
                        let start = stack.iter().position(|(k, _)| *k == target).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|(k, _)| k.to_string()).collect();
                        cycle.push(target.to_string());
                        return Some(cycle);
                    }
                    None => {
                        marks.insert(target, Mark::Active);
                        stack.push((target, 0));
                    }
                }
            }
        }
        None
    }

    /// Removes a feed. Its instances stay in the store.
    ///
    /// Returns this very snapshot, unchanged, when the feed is unknown.
    pub fn drop_feed(self: &Arc<Self>, sink: &dyn EventSink, feed: &Artifact) -> ChangedInfo {
        let Some(dropped) = self.feeds.get(feed) else {
            debug!(feed = %feed, "feed not found, nothing to drop");
            return ChangedInfo::unchanged(self.clone());
        };

        let mut feeds = self.feeds.clone();
        feeds.remove(feed);
        let db = Arc::new(Self {
            instances: self.instances.clone(),
            feeds,
            last_update: self.last_update,
            serial_number: self.serial_number + 1,
        });

        let changed = ChangedInfo {
            dropped_feeds: vec![dropped.clone()],
            ..ChangedInfo::unchanged(db)
        };
        committed(sink, &changed);
        changed
    }

    /// A snapshot stamped with `time`; serial + 1 unless the time is the same.
    pub fn with_last_update(self: &Arc<Self>, time: DateTime<Utc>) -> Arc<Self> {
        if self.last_update == time {
            return self.clone();
        }
        Arc::new(Self {
            instances: self.instances.clone(),
            feeds: self.feeds.clone(),
            last_update: time,
            serial_number: self.serial_number + 1,
        })
    }
}

#[derive(Clone, Copy)]
enum Mark {
    Active,
    Done,
}

/// Dependencies of `key` once the batch is applied.
fn dependencies_in<'a>(
    store: &'a InstanceStore,
    pending: &'a BTreeMap<ArtifactInstance, Candidate>,
    key: &ArtifactInstance,
) -> &'a [Reference] {
    match pending.get(key) {
        Some(candidate) => &candidate.dependencies,
        None => store.get_by_key(key).map(|i| i.dependencies()).unwrap_or_default(),
    }
}

fn diff_for<'a>(
    diffs: &'a mut BTreeMap<Artifact, FeedDiff>,
    feed: &Arc<PackageFeed>,
) -> &'a mut FeedDiff {
    diffs
        .entry(feed.artifact().clone())
        .or_insert_with(|| FeedDiff::new(feed.clone()))
}

fn parse_feeds(key: &ArtifactInstance, names: &[String]) -> Result<BTreeSet<Artifact>> {
    let ty = key.artifact_type();
    names
        .iter()
        .map(|name| {
            let invalid = || {
                DatabaseError::InvalidFeedName {
                    package: key.to_string(),
                    feed: name.clone(),
                }
            };
            let (type_name, feed_name) = name.split_once(':').ok_or_else(invalid)?;
            if type_name.trim() != ty.name() {
                return Err(DatabaseError::FeedTypeMismatch {
                    package: key.to_string(),
                    feed: name.clone(),
                });
            }
            Artifact::new(ty.clone(), feed_name.trim()).map_err(|_| invalid())
        })
        .collect()
}

fn reject(sink: &dyn EventSink, err: DatabaseError) -> DatabaseError {
    let reason = match &err {
        DatabaseError::FeedTypeMismatch { package, feed } => {
            Some(RejectReason::FeedTypeMismatch {
                package: package.clone(),
                feed: feed.clone(),
            })
        }
        DatabaseError::InvalidFeedName { package, feed } => {
            Some(RejectReason::InvalidFeedName {
                package: package.clone(),
                feed: feed.clone(),
            })
        }
        DatabaseError::UnresolvedDependencies { missing } => {
            Some(RejectReason::UnresolvedDependencies {
                missing: missing.clone(),
            })
        }
        DatabaseError::InvalidApplicableSavors {
            package, target, ..
        } => {
            Some(RejectReason::InvalidApplicableSavors {
                package: package.clone(),
                target: target.clone(),
            })
        }
        DatabaseError::DependencyCycle { cycle } => {
            Some(RejectReason::DependencyCycle {
                cycle: cycle.clone(),
            })
        }
        _ => None,
    };
    if let Some(reason) = reason {
        debug!("batch rejected: {err}");
        sink.emit(DbEvent::AddRejected { reason });
    }
    err
}

fn committed(sink: &dyn EventSink, changed: &ChangedInfo) {
    debug!(
        serial_number = changed.db.serial_number,
        packages = changed.package_changes.len(),
        new_feeds = changed.new_feeds.len(),
        updated_feeds = changed.feed_changes.len(),
        dropped_feeds = changed.dropped_feeds.len(),
        "committed database transition"
    );
    sink.emit(DbEvent::Committed {
        serial_number: changed.db.serial_number,
        package_changes: changed.package_changes.len(),
        new_feeds: changed.new_feeds.len(),
        updated_feeds: changed.feed_changes.len(),
        dropped_feeds: changed.dropped_feeds.len(),
    });
}

impl fmt::Debug for PackageDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageDatabase")
            .field("serial_number", &self.serial_number)
            .field("last_update", &self.last_update)
            .field("instances", &self.instances.len())
            .field("feeds", &self.feeds.len())
            .finish()
    }
}
