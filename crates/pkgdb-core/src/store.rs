//! The sorted, immutable, structurally shared instance array.

use std::{fmt, sync::Arc};

use crate::{
    artifact::{Artifact, ArtifactInstance, ArtifactType},
    instance::{PackageInstance, Reference},
};

/// One edit of a bulk merge, positioned in the array being edited.
///
/// Several operations may target the same position. They are applied in the
/// order delete, insert, update: a delete removes the row so a later update
/// at that position is dropped, while an insert still lands in its place.
#[derive(Debug, Clone)]
pub enum StoreOp {
    Delete {
        at: usize,
    },
    Insert {
        at: usize,
        instance: Arc<PackageInstance>,
    },
    Update {
        at: usize,
        instance: Arc<PackageInstance>,
    },
}

impl StoreOp {
    fn position(&self) -> usize {
        match self {
            StoreOp::Delete { at } | StoreOp::Insert { at, .. } | StoreOp::Update { at, .. } => *at,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StoreOp::Delete { .. } => 0,
            StoreOp::Insert { .. } => 1,
            StoreOp::Update { .. } => 2,
        }
    }
}

/// An immutable array of package instances, strictly increasing by key.
///
/// Every edit returns a new store. Untouched instances are shared by
/// reference between the old and the new array.
#[derive(Clone)]
pub struct InstanceStore {
    items: Arc<[Arc<PackageInstance>]>,
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an array the caller guarantees to be strictly increasing.
    pub(crate) fn from_sorted(items: Vec<Arc<PackageInstance>>) -> Self {
        debug_assert!(is_strictly_increasing(&items));
        Self {
            items: items.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Arc<PackageInstance>] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<PackageInstance>> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<PackageInstance>> {
        self.items.get(index)
    }

    /// Binary search by key: `Ok(index)` when present, `Err(insertion point)`
    /// otherwise.
    pub fn find(&self, key: &ArtifactInstance) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.key().cmp(key))
    }

    pub fn get_by_key(&self, key: &ArtifactInstance) -> Option<&Arc<PackageInstance>> {
        self.find(key).ok().map(|i| &self.items[i])
    }

    pub fn contains(&self, key: &ArtifactInstance) -> bool {
        self.find(key).is_ok()
    }

    /// The instance a dependency edge points to in this store.
    pub fn resolve(&self, reference: &Reference) -> Option<&Arc<PackageInstance>> {
        self.get_by_key(&reference.target)
    }

    /// Every instance of an artifact type, as a contiguous slice.
    pub fn instances_of_type(&self, ty: &ArtifactType) -> &[Arc<PackageInstance>] {
        let start = self
            .items
            .partition_point(|item| item.key().artifact_type() < ty);
        let end = start
            + self.items[start..].partition_point(|item| item.key().artifact_type() == ty);
        &self.items[start..end]
    }

    /// Every version of an artifact, in version order.
    pub fn instances_of(&self, artifact: &Artifact) -> &[Arc<PackageInstance>] {
        let start = self
            .items
            .partition_point(|item| item.key().artifact() < artifact);
        let end =
            start + self.items[start..].partition_point(|item| item.key().artifact() == artifact);
        &self.items[start..end]
    }

    /// Inserts the instance at its sorted position or replaces the entry
    /// with the same key.
    pub fn add_or_update(&self, instance: Arc<PackageInstance>) -> Self {
        let op = match self.find(instance.key()) {
            Ok(at) => {
                StoreOp::Update {
                    at,
                    instance,
                }
            }
            Err(at) => {
                StoreOp::Insert {
                    at,
                    instance,
                }
            }
        };
        self.apply(vec![op])
    }

    /// Bulk [`add_or_update`](Self::add_or_update) in a single merge pass.
    /// When the input repeats a key, the last occurrence wins.
    pub fn add<I>(&self, instances: I) -> Self
    where
        I: IntoIterator<Item = Arc<PackageInstance>>,
    {
        let mut incoming: Vec<Arc<PackageInstance>> = instances.into_iter().collect();
        incoming.sort_by(|a, b| a.key().cmp(b.key()));

        let mut ops: Vec<StoreOp> = Vec::with_capacity(incoming.len());
        let mut iter = incoming.into_iter().peekable();
        while let Some(instance) = iter.next() {
            if iter
                .peek()
                .is_some_and(|next| next.key() == instance.key())
            {
                continue;
            }
            ops.push(match self.find(instance.key()) {
                Ok(at) => {
                    StoreOp::Update {
                        at,
                        instance,
                    }
                }
                Err(at) => {
                    StoreOp::Insert {
                        at,
                        instance,
                    }
                }
            });
        }
        self.apply(ops)
    }

    /// Applies positioned operations, merging them with the current array in
    /// one linear pass.
    ///
    /// Positions refer to this store. Callers must keep the result sorted:
    /// an insert at `at` must sort between the rows `at - 1` and `at`, an
    /// update must keep the key of the row it replaces.
    pub fn apply(&self, mut ops: Vec<StoreOp>) -> Self {
        if ops.is_empty() {
            return self.clone();
        }
        ops.sort_by_key(|op| (op.position(), op.rank()));

        let old = &self.items;
        let mut items = Vec::with_capacity(old.len() + ops.len());
        let mut next = 0;
        for op in ops {
            let at = op.position().min(old.len());
            if next < at {
                items.extend_from_slice(&old[next..at]);
                next = at;
            }
            match op {
                StoreOp::Delete { .. } => {
                    if next == at && at < old.len() {
                        next += 1;
                    }
                }
                StoreOp::Insert { instance, .. } => items.push(instance),
                StoreOp::Update { instance, .. } => {
                    if next == at && at < old.len() {
                        items.push(instance);
                        next += 1;
                    }
                }
            }
        }
        items.extend_from_slice(&old[next..]);

        Self::from_sorted(items)
    }

    pub(crate) fn is_sorted(&self) -> bool {
        is_strictly_increasing(&self.items)
    }
}

fn is_strictly_increasing(items: &[Arc<PackageInstance>]) -> bool {
    items.windows(2).all(|w| w[0].key() < w[1].key())
}

impl<'a> IntoIterator for &'a InstanceStore {
    type Item = &'a Arc<PackageInstance>;
    type IntoIter = std::slice::Iter<'a, Arc<PackageInstance>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for InstanceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|item| item.key()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{artifact, instance, key, REGISTRY};

    fn store(keys: &[&str]) -> InstanceStore {
        InstanceStore::new().add(keys.iter().map(|k| instance(k, &[])))
    }

    fn keys(store: &InstanceStore) -> Vec<String> {
        store.iter().map(|i| i.key().to_string()).collect()
    }

    #[test]
    fn test_add_sorts_and_dedups() {
        let store = store(&[
            "NuGet:Foo/2.0.0",
            "NPM:left-pad/1.0.0",
            "NuGet:Bar/1.0.0",
            "NuGet:Foo/1.0.0",
            "NuGet:foo/2.0.0",
        ]);
        assert_eq!(
            keys(&store),
            vec![
                "NPM:left-pad/1.0.0",
                "NuGet:Bar/1.0.0",
                "NuGet:Foo/1.0.0",
                "NuGet:foo/2.0.0",
            ]
        );
        assert!(store.is_sorted());
    }

    #[test]
    fn test_find_matches_linear_scan() {
        let store = store(&[
            "NuGet:A/1.0.0",
            "NuGet:B/1.0.0",
            "NuGet:B/1.1.0",
            "NuGet:C/0.1.0",
            "NPM:A/1.0.0",
        ]);
        for (i, item) in store.iter().enumerate() {
            assert_eq!(store.find(item.key()), Ok(i));
        }

        let absent = key("NuGet:B/1.0.5");
        let expected = store.iter().position(|i| i.key() > &absent).unwrap();
        assert_eq!(store.find(&absent), Err(expected));
        assert_eq!(store.find(&key("NuGet:Z/1.0.0")), Err(store.len()));
        assert!(!store.contains(&absent));
    }

    #[test]
    fn test_range_queries() {
        let store = store(&[
            "NPM:B/1.0.0",
            "NuGet:A/1.0.0",
            "NuGet:B/2.0.0",
            "NuGet:B/1.0.0",
            "NuGet:C/1.0.0",
        ]);

        let versions: Vec<_> = store
            .instances_of(&artifact("NuGet:b"))
            .iter()
            .map(|i| i.key().version().to_string())
            .collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
        assert!(store.instances_of(&artifact("NuGet:Missing")).is_empty());

        let nuget = REGISTRY.get("NuGet").unwrap();
        assert_eq!(store.instances_of_type(&nuget).len(), 4);
        let ck = REGISTRY.get("CKSetup").unwrap();
        assert!(store.instances_of_type(&ck).is_empty());
    }

    #[test]
    fn test_add_or_update_is_copy_on_write() {
        let before = store(&["NuGet:A/1.0.0", "NuGet:C/1.0.0"]);
        let inserted = before.add_or_update(instance("NuGet:B/1.0.0", &[]));
        assert_eq!(before.len(), 2);
        assert_eq!(
            keys(&inserted),
            vec!["NuGet:A/1.0.0", "NuGet:B/1.0.0", "NuGet:C/1.0.0"]
        );
        assert!(Arc::ptr_eq(&before.as_slice()[0], &inserted.as_slice()[0]));
        assert!(Arc::ptr_eq(&before.as_slice()[1], &inserted.as_slice()[2]));

        let replacement = instance("NuGet:C/1.0.0", &["NuGet:A/1.0.0"]);
        let updated = inserted.add_or_update(replacement.clone());
        assert_eq!(updated.len(), 3);
        assert!(Arc::ptr_eq(&updated.as_slice()[2], &replacement));
        assert!(inserted.as_slice()[2].dependencies().is_empty());
    }

    #[test]
    fn test_delete_suppresses_update_but_not_insert_at_same_slot() {
        let before = store(&["NuGet:A/1.0.0", "NuGet:C/1.0.0", "NuGet:D/1.0.0"]);
        let after = before.apply(vec![
            StoreOp::Update {
                at: 1,
                instance: instance("NuGet:C/1.0.0", &["NuGet:A/1.0.0"]),
            },
            StoreOp::Insert {
                at: 1,
                instance: instance("NuGet:B/1.0.0", &[]),
            },
            StoreOp::Delete { at: 1 },
        ]);
        assert_eq!(keys(&after), vec!["NuGet:A/1.0.0", "NuGet:B/1.0.0", "NuGet:D/1.0.0"]);
    }

    #[test]
    fn test_insert_then_update_at_same_slot() {
        let before = store(&["NuGet:A/1.0.0", "NuGet:C/1.0.0"]);
        let updated = instance("NuGet:C/1.0.0", &["NuGet:A/1.0.0"]);
        let after = before.apply(vec![
            StoreOp::Update {
                at: 1,
                instance: updated.clone(),
            },
            StoreOp::Insert {
                at: 1,
                instance: instance("NuGet:B/1.0.0", &[]),
            },
            StoreOp::Insert {
                at: 2,
                instance: instance("NuGet:D/1.0.0", &[]),
            },
        ]);
        assert_eq!(
            keys(&after),
            vec![
                "NuGet:A/1.0.0",
                "NuGet:B/1.0.0",
                "NuGet:C/1.0.0",
                "NuGet:D/1.0.0"
            ]
        );
        assert!(Arc::ptr_eq(&after.as_slice()[2], &updated));
        assert!(after.is_sorted());
    }

    #[test]
    fn test_bulk_merge_mixed_operations() {
        let before = store(&[
            "NuGet:A/1.0.0",
            "NuGet:B/1.0.0",
            "NuGet:C/1.0.0",
            "NuGet:D/1.0.0",
        ]);
        let after = before.apply(vec![
            StoreOp::Delete { at: 3 },
            StoreOp::Insert {
                at: 0,
                instance: instance("NPM:Z/1.0.0", &[]),
            },
            StoreOp::Delete { at: 0 },
            StoreOp::Insert {
                at: 4,
                instance: instance("NuGet:E/1.0.0", &[]),
            },
            StoreOp::Update {
                at: 2,
                instance: instance("NuGet:C/1.0.0", &["NuGet:B/1.0.0"]),
            },
        ]);
        assert_eq!(
            keys(&after),
            vec!["NPM:Z/1.0.0", "NuGet:B/1.0.0", "NuGet:C/1.0.0", "NuGet:E/1.0.0"]
        );
        assert_eq!(after.as_slice()[2].dependencies().len(), 1);
        assert!(Arc::ptr_eq(&before.as_slice()[1], &after.as_slice()[1]));
    }

    #[test]
    fn test_apply_without_ops_shares_the_array() {
        let before = store(&["NuGet:A/1.0.0"]);
        let after = before.apply(Vec::new());
        assert!(Arc::ptr_eq(&before.items, &after.items));
    }
}
